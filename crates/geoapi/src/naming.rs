//! # Region Names
//!
//! Names are `prefix + middle + suffix` drawn from fixed word banks
//! ("Bel" + "or" + "heim"). Each composer hands out a name at most once.

use std::collections::HashSet;

use rand::Rng;

use crate::error::{AppError, AppResult};

const PREFIXES: [&str; 39] = [
    "Ark", "Bel", "Dor", "Fen", "Gor", "Kal", "Lor", "Mar", "Nor", "Sel", "Tor", "Vas", "Zar", "Al", "Bra",
    "Cam", "Del", "Er", "Fal", "Gal", "Hel", "Ith", "Jar", "Kel", "Len", "Mor", "Nol", "Or", "Pra", "Quel",
    "Ral", "Ser", "Tal", "Ul", "Val", "Wen", "Xan", "Yor", "Zel",
];

const MIDDLES: [&str; 17] = [
    "an", "ar", "en", "el", "or", "ol", "ir", "il", "un", "ur", "eth", "im", "is", "ith", "est", "os", "oth",
];

const SUFFIXES: [&str; 23] = [
    "dale", "grad", "heim", "land", "mere", "port", "ridge", "shire", "ton", "vale", "ville", "wald", "keep",
    "watch", "hold", "hollow", "cairn", "fell", "march", "moor", "gate", "forge", "reach",
];

/// Random draws tried before falling back to a scan of the whole space.
const RANDOM_ATTEMPTS: usize = 32;

/// Hands out unique region names.
#[derive(Debug)]
pub struct RegionNameComposer {
    // Combination indices already tried; distinct indices can spell the same name
    tried: Vec<bool>,
    used: HashSet<String>,
}

impl Default for RegionNameComposer {
    fn default() -> Self {
        Self {
            tried: vec![false; Self::COMBINATIONS],
            used: HashSet::new(),
        }
    }
}

impl RegionNameComposer {
    /// Number of word combinations.
    pub const COMBINATIONS: usize = PREFIXES.len() * MIDDLES.len() * SUFFIXES.len();

    /// Creates a composer with no names used.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names handed out so far.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.len()
    }

    /// Returns a name not returned before.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NamesExhausted`] once every combination is used.
    pub fn compose<R: Rng + ?Sized>(&mut self, rng: &mut R) -> AppResult<String> {
        for _ in 0..RANDOM_ATTEMPTS {
            if let Some(name) = self.try_index(rng.gen_range(0..Self::COMBINATIONS)) {
                return Ok(name);
            }
        }

        // Crowded: walk the space from a random start so the call terminates
        let start = rng.gen_range(0..Self::COMBINATIONS);
        for offset in 0..Self::COMBINATIONS {
            if let Some(name) = self.try_index((start + offset) % Self::COMBINATIONS) {
                return Ok(name);
            }
        }
        Err(AppError::NamesExhausted { used: self.used.len() })
    }

    fn try_index(&mut self, index: usize) -> Option<String> {
        if std::mem::replace(&mut self.tried[index], true) {
            return None;
        }
        let name = name_at(index);
        self.used.insert(name.clone()).then_some(name)
    }
}

fn name_at(index: usize) -> String {
    let suffix = SUFFIXES[index % SUFFIXES.len()];
    let rest = index / SUFFIXES.len();
    let middle = MIDDLES[rest % MIDDLES.len()];
    let prefix = PREFIXES[rest / MIDDLES.len()];
    format!("{prefix}{middle}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_word_banks() {
        assert_eq!(RegionNameComposer::COMBINATIONS, 39 * 17 * 23);
        assert_eq!(name_at(0), "Arkandale");
        assert_eq!(name_at(RegionNameComposer::COMBINATIONS - 1), "Zelothreach");
    }

    #[test]
    fn test_names_are_unique() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut composer = RegionNameComposer::new();
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            assert!(seen.insert(composer.compose(&mut rng).unwrap()));
        }
        assert_eq!(composer.used(), 2000);
    }

    #[test]
    fn test_same_seed_same_names() {
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut composer = RegionNameComposer::new();
            (0..50).map(|_| composer.compose(&mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut composer = RegionNameComposer::new();
        let mut produced = 0;
        loop {
            match composer.compose(&mut rng) {
                Ok(_) => produced += 1,
                Err(AppError::NamesExhausted { used }) => {
                    assert_eq!(used, produced);
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(produced > 0 && produced <= RegionNameComposer::COMBINATIONS);
    }
}
