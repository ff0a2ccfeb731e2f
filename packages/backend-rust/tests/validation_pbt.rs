//! Property-based tests for input validation and PII masking.
//!
//! - Phone and Aadhaar patterns accept exactly their digit shapes
//! - Masked values never expose the hidden digits
//! - Response lists outside 1..=12 items are rejected
//! - Sealed Aadhaar numbers open back to the original under the same key

use proptest::prelude::*;
use serde_json::{json, Value};

use career_navigator_backend::services::assessment::validate_responses;
use career_navigator_backend::services::encryption::{mask_aadhaar, mask_phone, FieldCipher};
use career_navigator_backend::services::validation::{
    is_strong_password, is_valid_aadhaar, is_valid_phone,
};

const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

fn responses(count: usize) -> Value {
    let items: Vec<Value> = (1..=count)
        .map(|id| json!({"questionId": id, "answer": "Agree"}))
        .collect();
    Value::Array(items)
}

proptest! {
    #[test]
    fn mobile_numbers_start_with_six_to_nine(lead in 0u8..=9, rest in "[0-9]{9}") {
        let phone = format!("{lead}{rest}");
        prop_assert_eq!(is_valid_phone(&phone), lead >= 6);
    }

    #[test]
    fn aadhaar_needs_exactly_twelve_digits(digits in "[0-9]{1,16}") {
        prop_assert_eq!(is_valid_aadhaar(&digits), digits.len() == 12);
    }

    #[test]
    fn aadhaar_mask_keeps_only_last_four(digits in "[0-9]{12}") {
        let masked = mask_aadhaar(&digits);
        prop_assert_eq!(masked.len(), 14);
        prop_assert!(masked.starts_with("XXXX-XXXX-"));
        prop_assert!(masked.ends_with(&digits[8..]));
    }

    #[test]
    fn phone_mask_hides_last_four(phone in "[6-9][0-9]{9}") {
        let masked = mask_phone(&phone);
        prop_assert_eq!(&masked[..6], &phone[..6]);
        prop_assert!(masked.ends_with("-****"));
    }

    #[test]
    fn passwords_without_special_characters_are_weak(raw in "[A-Za-z0-9]{0,24}") {
        prop_assert!(!is_strong_password(&raw));
    }

    #[test]
    fn response_count_bounds(count in 0usize..=20) {
        let result = validate_responses(Some(&responses(count)));
        prop_assert_eq!(result.is_ok(), (1..=12).contains(&count));
    }

    #[test]
    fn sealed_aadhaar_opens_with_same_key(digits in "[0-9]{12}") {
        let cipher = FieldCipher::from_hex(KEY).unwrap();
        let sealed = cipher.encrypt(&digits).unwrap();
        prop_assert_ne!(&sealed.encrypted, &digits);
        prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), digits);
    }
}
