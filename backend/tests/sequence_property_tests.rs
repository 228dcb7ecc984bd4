//! Property tests for identifier sequences
//!
//! - Every allocation agrees with the admin preview of the stored value
//! - Numeric runs strictly increase until the letter run advances
//! - Letter runs advance in base-26 order

mod common;

use common::memory_service;
use proptest::prelude::*;
use rental_backend::store::SequenceStore;
use shared::sequence::{increment_letters, next_identifier, preview_next, SequenceParts};

fn prefix_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{1,5}(-[A-Z]{1,3})?"
}

fn letters_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,5}"
}

fn numbers_strategy() -> impl Strategy<Value = String> {
    "[0-9]{1,8}"
}

/// Base-26 value of an uppercase letter run, with length as the major key
fn letter_rank(letters: &str) -> (usize, u64) {
    let value = letters
        .bytes()
        .fold(0u64, |acc, b| acc * 26 + u64::from(b - b'A'));
    (letters.len(), value)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_increment_letters_is_successor(letters in "[A-Z]{1,6}") {
        let next = increment_letters(&letters).unwrap();
        let (len, value) = letter_rank(&letters);
        let (next_len, next_value) = letter_rank(&next);

        if letters.chars().all(|c| c == 'Z') {
            prop_assert_eq!(next_len, len + 1);
            prop_assert_eq!(next_value, 0);
        } else {
            prop_assert_eq!(next_len, len);
            prop_assert_eq!(next_value, value + 1);
        }
    }

    #[test]
    fn prop_increment_letters_rejects_non_letters(
        head in "[A-Za-z]{0,3}",
        bad in "[^A-Za-z]",
        tail in "[A-Za-z]{0,3}"
    ) {
        let letters = format!("{}{}{}", head, bad, tail);
        prop_assert!(increment_letters(&letters).is_err());
    }

    #[test]
    fn prop_next_identifier_increments_or_rolls_over(
        prefix in prefix_strategy(),
        letters in letters_strategy(),
        numbers in numbers_strategy()
    ) {
        let latest = format!("{}-{}{}", prefix, letters, numbers);
        let next = next_identifier(&latest, &prefix).unwrap();
        let parts = SequenceParts::parse(&next, &prefix).unwrap();

        let upper = letters.to_ascii_uppercase();
        if numbers.chars().all(|c| c == '9') {
            prop_assert_eq!(parts.letters, increment_letters(&upper).unwrap());
            prop_assert_eq!(parts.numbers, "0001");
        } else {
            prop_assert_eq!(parts.letters, upper);
            prop_assert_eq!(parts.numbers.len(), numbers.len());
            let before: u64 = numbers.parse().unwrap();
            let after: u64 = parts.numbers.parse().unwrap();
            prop_assert_eq!(after, before + 1);
        }
    }

    #[test]
    fn prop_corrupt_values_preview_reset(
        prefix in prefix_strategy(),
        garbage in "[a-z_ ]{0,6}[0-9]{0,3}[_x]{1,2}"
    ) {
        let latest = format!("{}-{}", prefix, garbage);
        prop_assert!(next_identifier(&latest, &prefix).is_err());

        let preview = preview_next(&latest, &prefix);
        prop_assert!(preview.reset);
        prop_assert_eq!(preview.next_id, format!("{}-AAA0001", prefix));
    }

    #[test]
    fn prop_allocation_matches_preview(
        prefix in prefix_strategy(),
        stored in prop_oneof![
            ("[A-Za-z]{1,4}", "[0-9]{1,6}").prop_map(|(l, n)| format!("{}{}", l, n)),
            "[a-z_]{1,8}",
        ]
    ) {
        let rt = runtime();
        let (service, store) = memory_service();
        let latest = format!("{}-{}", prefix, stored);

        let allocated = rt.block_on(async {
            store.put(&prefix, &latest).await.unwrap();
            service.generate_id(&prefix).await.unwrap()
        });

        prop_assert_eq!(allocated, preview_next(&latest, &prefix).next_id);
    }
}
