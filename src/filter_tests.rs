//! Tests for the medical streaming filter

use super::*;
use proptest::prelude::*;

fn feed(filter: &mut MedicalStreamingFilter, tokens: &[&str]) -> Vec<String> {
    tokens.iter().filter_map(|t| filter.add_token(t)).collect()
}

#[test]
fn test_plain_text_passes_through() {
    let mut filter = MedicalStreamingFilter::new();
    assert_eq!(filter.add_token("The heart "), Some("The heart ".to_string()));
    assert_eq!(filter.add_token("pumps blood"), Some("pumps blood".to_string()));
    assert!(!filter.is_buffering());
    assert_eq!(filter.flush(), None);
    assert_eq!(filter.released_content(), "The heart pumps blood");
}

#[test]
fn test_holds_partial_word_that_could_become_critical() {
    let mut filter = MedicalStreamingFilter::new();
    assert_eq!(filter.add_token("You should Ca"), Some("You should ".to_string()));
    assert_eq!(filter.pending(), "Ca");
    assert_eq!(filter.add_token("lm down."), Some("Calm down.".to_string()));
    assert!(!filter.is_buffering());
}

#[test]
fn test_critical_sentence_released_whole() {
    let mut filter = MedicalStreamingFilter::new();
    let out = feed(&mut filter, &["Call 911 if ", "sympto", "ms worsen."]);
    assert_eq!(out, vec!["Call 911 if symptoms worsen.".to_string()]);
}

#[test]
fn test_releases_complete_sentences_and_reevaluates_rest() {
    let mut filter = MedicalStreamingFilter::new();
    let out = filter.add_token("Seek emergency care now. Rest is ");
    assert_eq!(out, Some("Seek emergency care now. Rest is ".to_string()));
    assert!(!filter.is_buffering());
}

#[test]
fn test_keeps_incomplete_critical_tail() {
    let mut filter = MedicalStreamingFilter::new();
    let out = filter.add_token("Drink fluids. Take 500 mg every");
    assert_eq!(out, Some("Drink fluids.".to_string()));
    assert_eq!(filter.pending(), " Take 500 mg every");
    assert!(filter.is_buffering());
}

#[test]
fn test_trailing_number_is_held() {
    let mut filter = MedicalStreamingFilter::new();
    assert_eq!(filter.add_token("Take 5"), None);
    assert_eq!(filter.add_token("00"), None);
    assert_eq!(filter.pending(), "Take 500");
}

#[test]
fn test_unit_forming_after_number_is_held() {
    let mut filter = MedicalStreamingFilter::new();
    let out = feed(&mut filter, &["Take 500 ", "m", "g every 6 hours."]);
    assert_eq!(out, vec!["Take 500 mg every 6 hours.".to_string()]);

    let mut filter = MedicalStreamingFilter::new();
    assert_eq!(filter.add_token("Swallow 2 ca"), None);
    assert_eq!(filter.pending(), "Swallow 2 ca");
}

#[test]
fn test_decimal_point_is_not_a_sentence_end() {
    let mut filter = MedicalStreamingFilter::new();
    assert_eq!(filter.add_token("Use 2."), None);
    assert_eq!(
        filter.add_token("5 ml twice daily. "),
        Some("Use 2.5 ml twice daily. ".to_string())
    );
}

#[test]
fn test_flush_releases_and_counts_incomplete_critical_content() {
    let mut filter = MedicalStreamingFilter::new();
    filter.add_token("If breathing stops, call");
    assert_eq!(filter.flush(), Some("If breathing stops, call".to_string()));
    assert_eq!(filter.safety_warnings(), 1);
    assert_eq!(filter.flush(), None);
    assert_eq!(filter.safety_warnings(), 1);
}

#[test]
fn test_flush_of_held_partial_word_is_not_a_warning() {
    let mut filter = MedicalStreamingFilter::new();
    filter.add_token("Ca");
    assert_eq!(filter.flush(), Some("Ca".to_string()));
    assert_eq!(filter.safety_warnings(), 0);
}

#[test]
fn test_is_critical_patterns() {
    assert!(is_critical("call 911"));
    assert!(is_critical("EMERGENCY"));
    assert!(is_critical("a seizure"));
    assert!(is_critical("take 2 tablets"));
    assert!(is_critical("0.5mg"));
    assert!(is_critical("about 40"));
    assert!(is_critical("Take 500 m"));
    assert!(is_critical("2 ta"));
    assert!(!is_critical("The liver filters blood."));
    assert!(!is_critical("calcium helps bones"));
    assert!(!is_critical("In 2019 a study found"));
}

#[test]
fn test_last_sentence_end() {
    assert_eq!(last_sentence_end("One. Two"), Some(4));
    assert_eq!(last_sentence_end("One! Two?"), Some(9));
    assert_eq!(last_sentence_end("Dose 2."), None);
    assert_eq!(last_sentence_end("No end here"), None);
}

// For any split of an emergency or dosage instruction, nothing past the start
// of the instruction is released before the sentence is complete.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_emergency_sentence_never_emitted_partially(
        cuts in prop::collection::btree_set(1usize..28, 0..10),
    ) {
        let sentence = "Call 911 if symptoms worsen.";
        let mut bounds: Vec<usize> = cuts.into_iter().filter(|c| *c < sentence.len()).collect();
        bounds.insert(0, 0);
        bounds.push(sentence.len());

        let mut filter = MedicalStreamingFilter::new();
        let mut emitted = Vec::new();
        for pair in bounds.windows(2) {
            if let Some(out) = filter.add_token(&sentence[pair[0]..pair[1]]) {
                emitted.push(out);
            }
        }

        prop_assert_eq!(emitted, vec![sentence.to_string()]);
        prop_assert_eq!(filter.flush(), None);
    }

    #[test]
    fn prop_dosage_never_released_before_its_unit(
        cuts in prop::collection::btree_set(1usize..26, 0..10),
    ) {
        let sentence = "Take 500 mg every 6 hours.";
        let number_start = sentence.find('5').unwrap();
        let mut bounds: Vec<usize> = cuts.into_iter().filter(|c| *c < sentence.len()).collect();
        bounds.insert(0, 0);
        bounds.push(sentence.len());

        let mut filter = MedicalStreamingFilter::new();
        let mut released = 0;
        for pair in bounds.windows(2) {
            if let Some(out) = filter.add_token(&sentence[pair[0]..pair[1]]) {
                released += out.len();
                prop_assert!(released <= number_start || released == sentence.len());
            }
        }

        prop_assert_eq!(filter.released_content(), sentence);
        prop_assert_eq!(filter.flush(), None);
    }

    #[test]
    fn prop_no_content_is_lost(
        tokens in prop::collection::vec("[a-zA-Z0-9 .,!?]{0,12}", 0..20),
    ) {
        let mut filter = MedicalStreamingFilter::new();
        let mut out = String::new();
        for token in &tokens {
            if let Some(released) = filter.add_token(token) {
                out.push_str(&released);
            }
        }
        if let Some(rest) = filter.flush() {
            out.push_str(&rest);
        }
        prop_assert_eq!(&out, &tokens.concat());
        prop_assert_eq!(filter.released_content(), tokens.concat());
    }
}
