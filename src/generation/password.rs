//! # Password Generation
//!
//! Random passwords from [`GeneratedValueSpec`] parameters.
//!
//! The effective length is drawn from `[minLength, maxLength]` when `maxLength`
//! is set (collapsing to `maxLength` when `minLength >= maxLength`), otherwise it
//! is `max(length, minLength)`. Symbol and digit counts are drawn from
//! `[0, maxSymbols]` and `[0, maxDigits]` and capped at the length.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crd::GeneratedValueSpec;

const LOWER_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const MIXED_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("{symbols} symbols and {digits} digits exceed the password length {length}")]
    ExceedsLength {
        length: usize,
        symbols: usize,
        digits: usize,
    },
    #[error("no character can follow {previous:?} without repeating it")]
    RepeatUnavoidable { previous: char },
}

/// Concrete parameters drawn from a [`GeneratedValueSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub length: usize,
    pub symbols: usize,
    pub digits: usize,
    pub no_upper: bool,
    pub no_repeat: bool,
}

#[derive(Debug, Clone, Copy)]
enum CharClass {
    Letter,
    Digit,
    Symbol,
}

/// `0` when `max` is zero, `max` when `min >= max`, otherwise uniform in `[min, max]`
fn random_between<R: Rng + ?Sized>(rng: &mut R, min: u32, max: u32) -> u32 {
    if max == 0 {
        0
    } else if min >= max {
        max
    } else {
        rng.gen_range(min..=max)
    }
}

impl PasswordParams {
    /// Draw length, symbol and digit counts
    pub fn resolve<R: Rng + ?Sized>(spec: &GeneratedValueSpec, rng: &mut R) -> Self {
        let length = if spec.max_length > 0 {
            random_between(rng, spec.min_length, spec.max_length)
        } else {
            spec.length.max(spec.min_length)
        };
        let length = length as usize;
        let symbols = (random_between(rng, 0, spec.max_symbols) as usize).min(length);
        let digits = (random_between(rng, 0, spec.max_digits) as usize).min(length);
        Self {
            length,
            symbols,
            digits,
            no_upper: spec.forbids_upper(),
            no_repeat: spec.forbids_repeats(),
        }
    }

    fn letters(&self) -> &'static [u8] {
        if self.no_upper {
            LOWER_LETTERS
        } else {
            MIXED_LETTERS
        }
    }

    /// Build a password with exactly `symbols` symbols, `digits` digits and letters for the rest
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Zeroizing<String>, PasswordError> {
        let letters = self
            .length
            .checked_sub(self.symbols + self.digits)
            .ok_or(PasswordError::ExceedsLength {
                length: self.length,
                symbols: self.symbols,
                digits: self.digits,
            })?;

        let mut classes = Vec::with_capacity(self.length);
        classes.extend(std::iter::repeat_n(CharClass::Symbol, self.symbols));
        classes.extend(std::iter::repeat_n(CharClass::Digit, self.digits));
        classes.extend(std::iter::repeat_n(CharClass::Letter, letters));
        classes.shuffle(rng);

        let mut password = Zeroizing::new(String::with_capacity(self.length));
        let mut previous: Option<char> = None;
        for class in classes {
            let pool = match class {
                CharClass::Letter => self.letters(),
                CharClass::Digit => DIGITS,
                CharClass::Symbol => SYMBOLS,
            };
            let next = self.pick(rng, pool, previous)?;
            password.push(next);
            previous = Some(next);
        }
        Ok(password)
    }

    fn pick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        pool: &[u8],
        previous: Option<char>,
    ) -> Result<char, PasswordError> {
        match previous {
            Some(prev) if self.no_repeat => {
                let candidates: Vec<u8> = pool.iter().copied().filter(|&c| char::from(c) != prev).collect();
                candidates
                    .choose(rng)
                    .map(|&c| char::from(c))
                    .ok_or(PasswordError::RepeatUnavoidable { previous: prev })
            }
            _ => Ok(char::from(pool[rng.gen_range(0..pool.len())])),
        }
    }
}

/// Generate a password for `spec` using the thread-local CSPRNG
pub fn generate_password(spec: &GeneratedValueSpec) -> Result<Zeroizing<String>, PasswordError> {
    let mut rng = rand::thread_rng();
    PasswordParams::resolve(spec, &mut rng).generate(&mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GeneratedValueSpec {
        GeneratedValueSpec::default()
    }

    #[test]
    fn test_length_within_min_max() {
        let spec = GeneratedValueSpec {
            min_length: 10,
            max_length: 32,
            ..spec()
        };
        for _ in 0..200 {
            let password = generate_password(&spec).unwrap();
            assert!((10..=32).contains(&password.len()), "length {}", password.len());
        }
    }

    #[test]
    fn test_degenerate_range_uses_max_length() {
        let spec = GeneratedValueSpec {
            min_length: 10,
            max_length: 2,
            ..spec()
        };
        for _ in 0..20 {
            assert_eq!(generate_password(&spec).unwrap().len(), 2);
        }
    }

    #[test]
    fn test_fixed_length() {
        let spec = GeneratedValueSpec {
            length: 10,
            ..spec()
        };
        assert_eq!(generate_password(&spec).unwrap().len(), 10);

        let spec = GeneratedValueSpec {
            length: 4,
            min_length: 12,
            ..self::spec()
        };
        assert_eq!(generate_password(&spec).unwrap().len(), 12);
    }

    #[test]
    fn test_exact_class_counts() {
        let params = PasswordParams {
            length: 20,
            symbols: 3,
            digits: 5,
            no_upper: true,
            no_repeat: false,
        };
        let password = params.generate(&mut rand::thread_rng()).unwrap();
        assert_eq!(password.len(), 20);
        assert_eq!(password.bytes().filter(|c| SYMBOLS.contains(c)).count(), 3);
        assert_eq!(password.bytes().filter(u8::is_ascii_digit).count(), 5);
        assert_eq!(password.bytes().filter(u8::is_ascii_lowercase).count(), 12);
        assert!(!password.bytes().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_no_repeat_never_repeats_adjacent_characters() {
        let params = PasswordParams {
            length: 64,
            symbols: 10,
            digits: 20,
            no_upper: true,
            no_repeat: true,
        };
        for _ in 0..50 {
            let password = params.generate(&mut rand::thread_rng()).unwrap();
            let bytes = password.as_bytes();
            assert!(bytes.windows(2).all(|w| w[0] != w[1]), "{}", password.as_str());
        }
    }

    #[test]
    fn test_counts_exceeding_length_are_rejected() {
        let params = PasswordParams {
            length: 4,
            symbols: 3,
            digits: 3,
            no_upper: false,
            no_repeat: false,
        };
        assert_eq!(
            params.generate(&mut rand::thread_rng()).unwrap_err(),
            PasswordError::ExceedsLength {
                length: 4,
                symbols: 3,
                digits: 3
            }
        );
    }

    #[test]
    fn test_resolve_caps_counts_at_length() {
        let spec = GeneratedValueSpec {
            length: 3,
            max_symbols: 50,
            max_digits: 50,
            ..spec()
        };
        let params = PasswordParams::resolve(&spec, &mut rand::thread_rng());
        assert!(params.symbols <= 3);
        assert!(params.digits <= 3);
    }

    #[test]
    fn test_random_between_edges() {
        let mut rng = rand::thread_rng();
        assert_eq!(random_between(&mut rng, 5, 0), 0);
        assert_eq!(random_between(&mut rng, 7, 7), 7);
        assert_eq!(random_between(&mut rng, 9, 3), 3);
        let n = random_between(&mut rng, 2, 4);
        assert!((2..=4).contains(&n));
    }

    #[test]
    fn test_two_generations_differ() {
        let spec = GeneratedValueSpec {
            length: 32,
            ..spec()
        };
        let first = generate_password(&spec).unwrap();
        let second = generate_password(&spec).unwrap();
        assert_ne!(first.as_str(), second.as_str());
    }
}
