use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::DrawError;

/// Upper bound on full reshuffles before giving up.
///
/// A uniform permutation has no fixed points with probability ~1/e, so the
/// expected number of attempts is ~2.7 and 50 failures in a row happen with
/// probability below 1e-9.
pub const MAX_ATTEMPTS: usize = 50;

/// Fewer than two people cannot be deranged.
pub const MIN_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derangement<T> {
    /// `(giver, receiver)` in the order the givers were supplied.
    pub pairs: Vec<(T, T)>,
    /// Shuffles it took to find `pairs`, including the accepted one.
    pub attempts: usize,
}

/// Pair every id with a different id so that the receivers are a
/// permutation of the givers.
///
/// Rejection sampling: shuffle a copy of `ids`, zip it with the original
/// order and accept the first candidate with no fixed points. `ids` must
/// be distinct.
pub fn derange<T, R>(ids: &[T], rng: &mut R, max_attempts: usize) -> Result<Derangement<T>, DrawError>
where
    T: Clone + PartialEq,
    R: Rng + ?Sized,
{
    if ids.len() < MIN_PARTICIPANTS {
        return Err(DrawError::InsufficientParticipants {
            found: ids.len(),
            required: MIN_PARTICIPANTS,
        });
    }

    let mut receivers = ids.to_vec();
    for attempt in 1..=max_attempts {
        receivers.shuffle(rng);
        if ids.iter().zip(&receivers).all(|(giver, receiver)| giver != receiver) {
            return Ok(Derangement {
                pairs: ids.iter().cloned().zip(receivers).collect(),
                attempts: attempt,
            });
        }
    }

    Err(DrawError::GenerationExhausted { attempts: max_attempts })
}
