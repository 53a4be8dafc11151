//! Front-to-back consumption of positional slots.

use std::collections::VecDeque;

use crate::descriptor::Arity;

#[derive(Debug)]
struct Slot {
    name: String,
    /// `None` for an unbounded slot.
    remaining: Option<usize>,
}

/// Hands out positional names in declaration order, honoring each one's
/// arity. An unbounded entry is never removed and absorbs every remaining
/// token.
#[derive(Debug, Default)]
pub(crate) struct ArgumentQueue {
    slots: VecDeque<Slot>,
}

impl ArgumentQueue {
    pub(crate) fn new<'a>(arguments: impl IntoIterator<Item = (&'a str, Arity)>) -> Self {
        let slots = arguments
            .into_iter()
            .filter_map(|(name, arity)| {
                let remaining = match arity {
                    Arity::Exact(0) => return None,
                    Arity::Exact(n) => Some(n),
                    Arity::Unbounded => None,
                };
                Some(Slot {
                    name: name.to_string(),
                    remaining,
                })
            })
            .collect();
        Self { slots }
    }

    /// Name of the positional that takes the next token, or `None` when every
    /// slot is used up.
    pub(crate) fn pop(&mut self) -> Option<String> {
        let front = self.slots.front_mut()?;
        match front.remaining.as_mut() {
            None => Some(front.name.clone()),
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.slots.pop_front().map(|slot| slot.name)
                } else {
                    Some(front.name.clone())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_counts_then_exhausted() {
        let mut q = ArgumentQueue::new([("src", Arity::Exact(1)), ("pair", Arity::Exact(2))]);
        assert_eq!(q.pop().as_deref(), Some("src"));
        assert_eq!(q.pop().as_deref(), Some("pair"));
        assert_eq!(q.pop().as_deref(), Some("pair"));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_unbounded_absorbs_rest() {
        let mut q = ArgumentQueue::new([("cmd", Arity::Exact(1)), ("rest", Arity::Unbounded)]);
        assert_eq!(q.pop().as_deref(), Some("cmd"));
        for _ in 0..5 {
            assert_eq!(q.pop().as_deref(), Some("rest"));
        }
    }

    #[test]
    fn test_zero_arity_is_skipped() {
        let mut q = ArgumentQueue::new([("none", Arity::Exact(0)), ("x", Arity::Exact(1))]);
        assert_eq!(q.pop().as_deref(), Some("x"));
        assert_eq!(q.pop(), None);
    }
}
