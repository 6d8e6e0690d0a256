//! Dense symbol registry and the array-backed map keyed by it.
//!
//! An [`Alphabet`] is built once, up front, and then shared by reference with every
//! [`AlphabetMap`] (and every trie) that uses it. Lookups go through a 256-entry table, so
//! resolving a symbol to its storage slot is a single indexed load.

const UNREGISTERED: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlphabetError {
    KeyNotAllowed(u8),
    Full,
}

impl std::fmt::Display for AlphabetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlphabetError::KeyNotAllowed(symbol) => write!(
                f,
                "Symbol '{}' is not registered in the alphabet",
                symbol.escape_ascii()
            ),
            AlphabetError::Full => write!(
                f,
                "Alphabet cannot hold more than {} symbols",
                UNREGISTERED
            ),
        }
    }
}

impl std::error::Error for AlphabetError {}

/// Append-only set of allowed symbols, in registration order
#[derive(Clone)]
pub struct Alphabet {
    symbols: Vec<u8>,
    slots: [u8; 256],
}

impl std::fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alphabet")
            .field("symbols", &self.symbols.escape_ascii().to_string())
            .finish()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            slots: [UNREGISTERED; 256],
        }
    }
}

impl Alphabet {
    /// Build an alphabet from `symbols`. Repeated symbols keep their first position.
    pub fn new(symbols: &[u8]) -> Result<Self, AlphabetError> {
        let mut alphabet = Self::default();
        for &symbol in symbols {
            alphabet.register(symbol)?;
        }
        Ok(alphabet)
    }

    /// Register a symbol and return its slot. Registering an existing symbol is a no-op.
    pub fn register(&mut self, symbol: u8) -> Result<usize, AlphabetError> {
        if let Some(slot) = self.slot(symbol) {
            return Ok(slot);
        }
        if self.symbols.len() >= UNREGISTERED as usize {
            return Err(AlphabetError::Full);
        }
        let slot = self.symbols.len();
        self.slots[symbol as usize] = slot as u8;
        self.symbols.push(symbol);
        Ok(slot)
    }

    #[inline]
    pub fn slot(&self, symbol: u8) -> Option<usize> {
        match self.slots[symbol as usize] {
            UNREGISTERED => None,
            slot => Some(slot as usize),
        }
    }

    #[inline]
    pub fn contains(&self, symbol: u8) -> bool {
        self.slots[symbol as usize] != UNREGISTERED
    }

    /// Symbol registered at `slot`
    pub fn symbol(&self, slot: usize) -> Option<u8> {
        self.symbols.get(slot).copied()
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Map from alphabet symbols to values, stored in a vector indexed by symbol slot.
///
/// Storage only grows as far as the highest slot set so far, so a map holding just `A`
/// and `C` of `ACGTN` costs two entries.
#[derive(Clone)]
pub struct AlphabetMap<'a, V> {
    alphabet: &'a Alphabet,
    storage: Vec<Option<V>>,
}

impl<V: std::fmt::Debug> std::fmt::Debug for AlphabetMap<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (char::from(k), v)))
            .finish()
    }
}

impl<'a, V> AlphabetMap<'a, V> {
    pub fn new(alphabet: &'a Alphabet) -> Self {
        Self {
            alphabet,
            storage: Vec::new(),
        }
    }

    /// Value stored for `key`. Unregistered keys are simply absent.
    #[inline]
    pub fn get(&self, key: u8) -> Option<&V> {
        let slot = self.alphabet.slot(key)?;
        self.storage.get(slot).and_then(Option::as_ref)
    }

    #[inline]
    pub fn contains(&self, key: u8) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` under `key`, returning the previous value
    pub fn set(&mut self, key: u8, value: V) -> Result<Option<V>, AlphabetError> {
        let slot = self
            .alphabet
            .slot(key)
            .ok_or(AlphabetError::KeyNotAllowed(key))?;
        if self.storage.len() <= slot {
            self.storage.resize_with(slot + 1, || None);
        }
        Ok(self.storage[slot].replace(value))
    }

    pub fn get_or_insert_with<F>(&mut self, key: u8, default: F) -> Result<&mut V, AlphabetError>
    where
        F: FnOnce() -> V,
    {
        let slot = self
            .alphabet
            .slot(key)
            .ok_or(AlphabetError::KeyNotAllowed(key))?;
        if self.storage.len() <= slot {
            self.storage.resize_with(slot + 1, || None);
        }
        Ok(self.storage[slot].get_or_insert_with(default))
    }

    /// Remove `key`, returning its value if it was present
    pub fn delete(&mut self, key: u8) -> Option<V> {
        let slot = self.alphabet.slot(key)?;
        self.storage.get_mut(slot).and_then(Option::take)
    }

    /// Present keys with their values, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &V)> + '_ {
        self.storage.iter().enumerate().filter_map(|(slot, value)| {
            value
                .as_ref()
                .and_then(|v| self.alphabet.symbol(slot).map(|key| (key, v)))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.storage.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values().count()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_registration_order() {
        let alphabet = Alphabet::new(b"ACGTNA").unwrap();
        assert_eq!(alphabet.symbols(), b"ACGTN");
        assert_eq!(alphabet.slot(b'A'), Some(0));
        assert_eq!(alphabet.slot(b'N'), Some(4));
        assert_eq!(alphabet.slot(b'X'), None);
        assert!(!alphabet.contains(b'a'));
    }

    #[test]
    fn test_alphabet_register_is_append_only() {
        let mut alphabet = Alphabet::new(b"ACGT").unwrap();
        assert_eq!(alphabet.register(b'N').unwrap(), 4);
        assert_eq!(alphabet.register(b'C').unwrap(), 1);
        assert_eq!(alphabet.len(), 5);
    }

    #[test]
    fn test_map_set_get_delete() {
        let alphabet = Alphabet::new(b"ACGTN").unwrap();
        let mut map = AlphabetMap::new(&alphabet);
        assert!(map.is_empty());
        assert_eq!(map.set(b'G', 7).unwrap(), None);
        assert_eq!(map.set(b'G', 8).unwrap(), Some(7));
        assert_eq!(map.get(b'G'), Some(&8));
        assert!(map.contains(b'G'));
        assert!(!map.contains(b'A'));
        assert_eq!(map.delete(b'G'), Some(8));
        assert_eq!(map.delete(b'G'), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_map_unregistered_key() {
        let alphabet = Alphabet::new(b"ACGT").unwrap();
        let mut map: AlphabetMap<u32> = AlphabetMap::new(&alphabet);
        assert_eq!(map.get(b'N'), None);
        assert!(!map.contains(b'N'));
        assert_eq!(map.delete(b'N'), None);
        assert_eq!(map.set(b'N', 1), Err(AlphabetError::KeyNotAllowed(b'N')));
        assert!(map
            .get_or_insert_with(b'N', || 1)
            .is_err());
    }

    #[test]
    fn test_map_iterates_in_registration_order() {
        let alphabet = Alphabet::new(b"ACGTN").unwrap();
        let mut map = AlphabetMap::new(&alphabet);
        map.set(b'N', "n").unwrap();
        map.set(b'C', "c").unwrap();
        map.set(b'A', "a").unwrap();
        let keys: Vec<u8> = map.keys().collect();
        assert_eq!(keys, b"ACN");
        let values: Vec<&str> = map.values().copied().collect();
        assert_eq!(values, vec!["a", "c", "n"]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_map_get_or_insert_with() {
        let alphabet = Alphabet::new(b"ACGT").unwrap();
        let mut map = AlphabetMap::new(&alphabet);
        *map.get_or_insert_with(b'T', || 0).unwrap() += 5;
        *map.get_or_insert_with(b'T', || 100).unwrap() += 1;
        assert_eq!(map.get(b'T'), Some(&6));
        map.clear();
        assert_eq!(map.get(b'T'), None);
    }
}
