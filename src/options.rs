use serde::{Deserialize, Serialize};

/// Engine behavior switches.
///
/// Owned by one [`Engine`](crate::Engine) and read fresh on every
/// registration and every run, so changes apply to the next operation.
///
/// # Examples
///
/// ```
/// use junban::EngineOptions;
///
/// let options = EngineOptions {
///     sort_by_priority: true,
///     ..Default::default()
/// };
/// assert!(!options.reject_duplicates);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Run steps in ascending priority order instead of registration order.
    pub sort_by_priority: bool,
    /// Refuse to register a step reference that is already registered.
    pub reject_duplicates: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_off() {
        let options = EngineOptions::default();
        assert!(!options.sort_by_priority);
        assert!(!options.reject_duplicates);
    }

    #[test]
    fn test_partial_document_loads() {
        let options: EngineOptions =
            serde_json::from_str(r#"{ "reject_duplicates": true }"#).unwrap();
        assert_eq!(
            options,
            EngineOptions {
                sort_by_priority: false,
                reject_duplicates: true,
            }
        );

        let options: EngineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, EngineOptions::default());
    }
}
