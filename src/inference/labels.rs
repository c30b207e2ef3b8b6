use serde::Deserialize;

/// Maps encoded class indices back to label strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn inverse_transform(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::LabelEncoder;

    #[test]
    fn decodes_known_indices_only() {
        let encoder = LabelEncoder::new(["female", "male"]);
        assert_eq!(encoder.inverse_transform(1), Some("male"));
        assert_eq!(encoder.inverse_transform(2), None);
    }

    #[test]
    fn parses_artifact_json() {
        let encoder: LabelEncoder = serde_json::from_str(r#"{"classes": ["female", "male"]}"#).unwrap();
        assert_eq!(encoder.classes(), &["female".to_string(), "male".to_string()]);
    }
}
