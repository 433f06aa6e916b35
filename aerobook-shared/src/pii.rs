use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for identity numbers and phone numbers. Debug and Display show
/// only the last four characters so the value can't leak through tracing
/// fields; serialization still carries the real value.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    fn masked(&self) -> String {
        let raw = self.0.as_ref();
        let visible = raw.chars().count().min(4);
        let tail: String = raw.chars().skip(raw.chars().count() - visible).collect();
        format!("****{}", tail)
    }

    pub fn expose(&self) -> &str {
        self.0.as_ref()
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_all_but_tail() {
        let id = Masked("11010519491231002X".to_string());
        assert_eq!(format!("{:?}", id), "****002X");
        assert_eq!(id.to_string(), "****002X");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"11010519491231002X\"");
    }

    #[test]
    fn test_short_values() {
        assert_eq!(Masked("ab").to_string(), "****ab");
    }
}
