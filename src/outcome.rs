/// Result of a step that degrades instead of failing the batch.
///
/// Callers must branch on all three cases: a page with nothing on it and a
/// page that could not be fetched are both "nothing to process", but only
/// the latter carries a reason worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Data(T),
    Empty,
    Failed(String),
}

impl<T> Outcome<T> {
    /// Wrap a value, treating an empty collection as [`Outcome::Empty`].
    pub fn from_collected(value: T, is_empty: impl FnOnce(&T) -> bool) -> Self {
        if is_empty(&value) {
            Outcome::Empty
        } else {
            Outcome::Data(value)
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Data(v) => Outcome::Data(f(v)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(reason) => Outcome::Failed(reason),
        }
    }

    pub fn data(self) -> Option<T> {
        match self {
            Outcome::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_propagates_degraded_cases() {
        let failed: Outcome<u32> = Outcome::Failed("boom".into());
        assert_eq!(failed.map(|n| n + 1), Outcome::Failed("boom".into()));
        assert_eq!(Outcome::<u32>::Empty.map(|n| n + 1), Outcome::Empty);
        assert_eq!(Outcome::Data(1).map(|n| n + 1), Outcome::Data(2));
    }

    #[test]
    fn from_collected_flags_empty() {
        assert!(Outcome::from_collected(Vec::<u8>::new(), Vec::is_empty).is_empty());
        assert_eq!(Outcome::from_collected(vec![1u8], Vec::is_empty), Outcome::Data(vec![1]));
    }
}
