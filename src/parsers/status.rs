use crate::models::Status;
use crate::platform::StatusRule;

/// Map raw status text onto the three-way status enum using the vocabulary
/// table. First matching token wins, so the table keeps negative phrases
/// ahead of the positives they contain. Unrecognized text maps to `Unknown`.
pub fn map_status(vocabulary: &[StatusRule], text: &str) -> Status {
    let text = text.to_lowercase();
    let text = text.trim();
    if text.is_empty() {
        return Status::Unknown;
    }
    for rule in vocabulary {
        if text.contains(rule.token.as_str()) {
            return rule.status;
        }
    }
    Status::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformProfile;
    use pretty_assertions::assert_eq;

    fn map(text: &str) -> Status {
        map_status(&PlatformProfile::default().status_vocabulary, text)
    }

    #[test]
    fn maps_positive_statuses() {
        assert_eq!(map("Available"), Status::Available);
        assert_eq!(map("true"), Status::Available);
    }

    #[test]
    fn maps_negative_statuses() {
        assert_eq!(map("Sold Out"), Status::Unavailable);
        assert_eq!(map("Reserved"), Status::Unavailable);
        assert_eq!(map("false"), Status::Unavailable);
    }

    #[test]
    fn negative_phrases_shadow_contained_positives() {
        assert_eq!(map("Not Available"), Status::Unavailable);
        assert_eq!(map("Unavailable"), Status::Unavailable);
    }

    #[test]
    fn unrecognized_text_maps_to_unknown() {
        assert_eq!(map("Ask at the gate"), Status::Unknown);
        assert_eq!(map(""), Status::Unknown);
    }
}
