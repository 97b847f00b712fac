//! PII tokenization for records sent to AI providers
//!
//! Merchants, accounts and person names found in payment descriptions are
//! replaced with stable pseudonyms (`MERCHANT_0042`, `ACCOUNT_003`,
//! `PERSON_001`) and dates are moved by an installation-wide offset before a
//! record leaves the machine. AI responses written in terms of those tokens
//! are mapped back with [`Tokenizer::detokenize`].
//!
//! Tokens live in the `token_maps` table and are never reassigned, so a token
//! means the same thing across sessions and across AI calls.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    AiProvider, PrivacySettings, Token, TokenMetadata, TokenPreview, TokenStats, TokenType,
};

/// Smallest date shift drawn for a new installation
pub const DATE_SHIFT_MIN_DAYS: i64 = 500;
/// Largest date shift drawn for a new installation
pub const DATE_SHIFT_MAX_DAYS: i64 = 1500;

/// Matches every token shape ever issued.
///
/// Sequence numbers outgrow their padding (`PERSON_1000`), so the whole digit
/// run is taken; a shorter prefix must never resolve to another token.
const TOKEN_PATTERN: &str = r"MERCHANT_[0-9]{4,}|ACCOUNT_[0-9]{3,}|PERSON_[0-9]{3,}";

/// Person-to-person payment services, scanned in this order.
///
/// Each pattern runs against the uppercased text; group 1 is the name.
const PERSON_PATTERNS: &[(&str, &str)] = &[
    (r"VENMO\s+(?:PAYMENT\s+)?([A-Z][A-Z\s]+)", "VENMO"),
    (r"ZELLE\s+(?:PAYMENT\s+)?(?:TO\s+|FROM\s+)?([A-Z][A-Z\s]+)", "ZELLE"),
    (r"PAYPAL\s+\*([A-Z][A-Z\s]+)", "PAYPAL"),
    (r"CASH\s+APP\s+\*([A-Z][A-Z\s]+)", "CASH APP"),
];

/// Normalize a value for use as a lookup key
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

struct PersonPattern {
    regex: Regex,
    service: &'static str,
}

#[derive(Default)]
struct TokenCache {
    forward: HashMap<(TokenType, String), String>,
    reverse: HashMap<String, String>,
    date_shift: Option<i64>,
}

impl TokenCache {
    fn remember(&mut self, token: &Token) {
        self.forward.insert(
            (token.token_type, token.normalized_value.clone()),
            token.token.clone(),
        );
        self.reverse
            .insert(token.token.clone(), token.original_value.clone());
    }
}

/// Tokenization engine over a [`Database`]
///
/// All issued tokens are loaded into memory on construction and every new
/// token is added as it is created; nothing is ever evicted. This is only
/// correct while this process is the sole writer to the token store. With
/// more than one writer, call [`Tokenizer::refresh`] before relying on
/// [`Tokenizer::detokenize`] for tokens another process may have issued.
pub struct Tokenizer {
    db: Database,
    cache: Mutex<TokenCache>,
    person_patterns: Vec<PersonPattern>,
    token_pattern: Regex,
}

impl Tokenizer {
    /// Create an engine and warm its cache from the token store
    pub fn new(db: Database) -> Result<Self> {
        let person_patterns = PERSON_PATTERNS
            .iter()
            .map(|(pattern, service)| {
                Ok(PersonPattern {
                    regex: Regex::new(pattern)?,
                    service,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tokenizer = Self {
            db,
            cache: Mutex::new(TokenCache::default()),
            person_patterns,
            token_pattern: Regex::new(TOKEN_PATTERN)?,
        };
        tokenizer.refresh()?;
        Ok(tokenizer)
    }

    fn cache(&self) -> MutexGuard<'_, TokenCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reload the cache from the token store
    pub fn refresh(&self) -> Result<()> {
        let tokens = self.db.all_tokens()?;
        let date_shift = self.db.get_date_shift()?.map(|s| s.shift_days);

        let mut fresh = TokenCache {
            date_shift,
            ..TokenCache::default()
        };
        for token in &tokens {
            fresh.remember(token);
        }

        debug!("Token cache loaded with {} tokens", tokens.len());
        *self.cache() = fresh;
        Ok(())
    }

    /// Look up or issue a token for `value`
    fn tokenize_value(
        &self,
        token_type: TokenType,
        value: &str,
        metadata: Option<&TokenMetadata>,
    ) -> Result<String> {
        let normalized = normalize(value);

        if let Some(token) = self.cache().forward.get(&(token_type, normalized.clone())) {
            return Ok(token.clone());
        }

        let token = match self.db.find_token(token_type, &normalized)? {
            Some(existing) => existing,
            None => self
                .db
                .create_token(token_type, value, &normalized, metadata)?,
        };

        self.cache().remember(&token);
        Ok(token.token)
    }

    /// Tokenize a merchant name, e.g. `"Whole Foods"` -> `"MERCHANT_0042"`
    ///
    /// Category labels are stored as metadata only when the token is first
    /// issued.
    pub fn tokenize_merchant(
        &self,
        name: &str,
        category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<String> {
        let mut metadata = TokenMetadata::new();
        if let Some(c) = category.filter(|c| !c.is_empty()) {
            metadata.insert("category".to_string(), c.to_string());
        }
        if let Some(s) = subcategory.filter(|s| !s.is_empty()) {
            metadata.insert("subcategory".to_string(), s.to_string());
        }
        self.tokenize_value(TokenType::Merchant, name, Some(&metadata))
    }

    /// Tokenize an account name, e.g. `"Chase Checking"` -> `"ACCOUNT_001"`
    pub fn tokenize_account(&self, name: &str, account_type: Option<&str>) -> Result<String> {
        let mut metadata = TokenMetadata::new();
        if let Some(t) = account_type.filter(|t| !t.is_empty()) {
            metadata.insert("account_type".to_string(), t.to_string());
        }
        self.tokenize_value(TokenType::Account, name, Some(&metadata))
    }

    /// Tokenize a person's name, e.g. `"JOHN SMITH"` -> `"PERSON_001"`
    pub fn tokenize_person(&self, name: &str) -> Result<String> {
        self.tokenize_value(TokenType::Person, name, None)
    }

    /// Replace person names in a payment description with person tokens
    ///
    /// `"VENMO PAYMENT JOHN SMITH"` becomes `"VENMO PERSON_001"`. Each service
    /// pattern replaces at most its first match. Text with no match is
    /// returned unchanged.
    pub fn tokenize_description(&self, text: &str) -> Result<String> {
        let mut result = text.to_string();

        for pattern in &self.person_patterns {
            // ASCII uppercasing keeps byte offsets valid for `result`
            let upper = result.to_ascii_uppercase();
            let Some(caps) = pattern.regex.captures(&upper) else {
                continue;
            };
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let person = name.as_str().trim_end();
            let person_token = self.tokenize_person(person)?;

            // Stop at the end of the name so trailing whitespace survives
            let end = name.start() + person.len();
            result.replace_range(
                whole.start()..end,
                &format!("{} {}", pattern.service, person_token),
            );
        }

        Ok(result)
    }

    /// The installation date shift, generated and persisted on first use
    pub fn date_shift_days(&self) -> Result<i64> {
        if let Some(shift) = self.cache().date_shift {
            return Ok(shift);
        }

        let shift = match self.db.get_date_shift()? {
            Some(existing) => existing.shift_days,
            None => {
                let candidate =
                    rand::thread_rng().gen_range(DATE_SHIFT_MIN_DAYS..=DATE_SHIFT_MAX_DAYS);
                self.db.get_or_create_date_shift(candidate)?.shift_days
            }
        };

        self.cache().date_shift = Some(shift);
        Ok(shift)
    }

    /// Move a date forward by the installation shift
    pub fn shift_date(&self, date: NaiveDate) -> Result<NaiveDate> {
        let shift = self.date_shift_days()?;
        date.checked_add_signed(Duration::days(shift))
            .ok_or_else(|| Error::InvalidData(format!("Date {} out of range after shift", date)))
    }

    /// Undo [`Tokenizer::shift_date`]
    pub fn unshift_date(&self, date: NaiveDate) -> Result<NaiveDate> {
        let shift = self.date_shift_days()?;
        date.checked_sub_signed(Duration::days(shift))
            .ok_or_else(|| Error::InvalidData(format!("Date {} out of range after unshift", date)))
    }

    /// Shift a date string, keeping its format
    ///
    /// Accepts `YYYY-MM-DD`, a naive ISO datetime, or an RFC 3339 timestamp;
    /// the time of day and offset are carried over unchanged.
    fn shift_date_text(&self, s: &str) -> Result<String> {
        let s = s.trim();
        let shift = Duration::days(self.date_shift_days()?);
        let out_of_range = || Error::InvalidData(format!("Date {} out of range after shift", s));

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let shifted = date.checked_add_signed(shift).ok_or_else(out_of_range)?;
            return Ok(shifted.format("%Y-%m-%d").to_string());
        }
        if let Ok(dt) = s.parse::<NaiveDateTime>() {
            let shifted = dt.checked_add_signed(shift).ok_or_else(out_of_range)?;
            return Ok(shifted.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            let shifted = dt.checked_add_signed(shift).ok_or_else(out_of_range)?;
            return Ok(shifted.to_rfc3339());
        }
        Err(Error::InvalidData(format!("Invalid transaction date: {}", s)))
    }

    /// Produce an anonymized copy of a transaction record for an AI prompt
    ///
    /// - `clean_merchant`/`merchant` become `merchant: "MERCHANT_0042"`, or
    ///   `"MERCHANT_0042 [Groceries]"` when `include_category` is set and the
    ///   record has a `category_name` (or `category`); `clean_merchant` and
    ///   `raw_description` are dropped
    /// - `description` goes through [`Tokenizer::tokenize_description`]
    /// - `date` is shifted and written back in the format it arrived in
    /// - `account_name` becomes `account: "ACCOUNT_001"`; `account_name` and
    ///   `account_type` are dropped
    ///
    /// Other fields are copied as they are. A `date` that is not a date
    /// string is rejected rather than passed through in clear.
    pub fn tokenize_transaction_for_ai(
        &self,
        record: &Map<String, Value>,
        include_category: bool,
    ) -> Result<Map<String, Value>> {
        let mut result = record.clone();

        if record.contains_key("merchant") || record.contains_key("clean_merchant") {
            let merchant = non_empty_str(record, "clean_merchant")
                .or_else(|| non_empty_str(record, "merchant"))
                .unwrap_or("");
            let category = if include_category {
                non_empty_str(record, "category_name").or_else(|| non_empty_str(record, "category"))
            } else {
                None
            };
            let subcategory = if include_category {
                non_empty_str(record, "subcategory_name")
                    .or_else(|| non_empty_str(record, "subcategory"))
            } else {
                None
            };

            let token = self.tokenize_merchant(merchant, category, subcategory)?;
            let value = match category {
                Some(c) => format!("{} [{}]", token, c),
                None => token,
            };
            result.insert("merchant".to_string(), Value::String(value));
            result.remove("clean_merchant");
            result.remove("raw_description");
        }

        if let Some(Value::String(description)) = record.get("description") {
            let tokenized = self.tokenize_description(description)?;
            result.insert("description".to_string(), Value::String(tokenized));
        }

        match record.get("date") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                let shifted = self.shift_date_text(s)?;
                result.insert("date".to_string(), Value::String(shifted));
            }
            Some(other) => {
                return Err(Error::InvalidData(format!(
                    "Transaction date must be a string, got {}",
                    other
                )));
            }
        }

        if let Some(Value::String(account_name)) = record.get("account_name") {
            let account_type = non_empty_str(record, "account_type");
            let token = self.tokenize_account(account_name, account_type)?;
            result.insert("account".to_string(), Value::String(token));
            result.remove("account_name");
            result.remove("account_type");
        }

        Ok(result)
    }

    /// Anonymize records for `provider` if its privacy settings require it
    pub fn anonymize_for_provider(
        &self,
        records: &[Map<String, Value>],
        provider: AiProvider,
        settings: &PrivacySettings,
        include_category: bool,
    ) -> Result<Vec<Map<String, Value>>> {
        if !settings.should_obfuscate(provider) {
            debug!("Obfuscation disabled for {}, sending records as-is", provider);
            return Ok(records.to_vec());
        }
        records
            .iter()
            .map(|r| self.tokenize_transaction_for_ai(r, include_category))
            .collect()
    }

    /// Replace every issued token in `text` with its original value
    ///
    /// Token-shaped strings that were never issued are left as they are.
    pub fn detokenize(&self, text: &str) -> String {
        let cache = self.cache();
        self.token_pattern
            .replace_all(text, |caps: &Captures| {
                let token = &caps[0];
                cache
                    .reverse
                    .get(token)
                    .cloned()
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }

    /// [`Tokenizer::detokenize`] every string inside a JSON value
    pub fn detokenize_json(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.detokenize(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.detokenize_json(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.detokenize_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Original value behind a token, if it was issued
    pub fn original_value(&self, token: &str) -> Option<String> {
        self.cache().reverse.get(token).cloned()
    }

    /// Merchants from `names` that have never been tokenized
    ///
    /// Keeps input order and casing.
    pub fn get_unknown_merchants<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        let mut unknown = Vec::new();
        for name in names {
            let name = name.as_ref();
            let normalized = normalize(name);
            let cached = self
                .cache()
                .forward
                .contains_key(&(TokenType::Merchant, normalized.clone()));
            if cached {
                continue;
            }
            if self.db.find_token(TokenType::Merchant, &normalized)?.is_none() {
                unknown.push(name.to_string());
            }
        }
        Ok(unknown)
    }

    /// Token counts per type and the date shift (0 if not generated yet)
    pub fn get_token_stats(&self) -> Result<TokenStats> {
        Ok(TokenStats {
            merchants: self.db.count_tokens(TokenType::Merchant)?,
            accounts: self.db.count_tokens(TokenType::Account)?,
            people: self.db.count_tokens(TokenType::Person)?,
            date_shift_days: self.db.get_date_shift()?.map_or(0, |s| s.shift_days),
        })
    }

    /// Show how `text` would be sent: as a merchant name and as a description
    pub fn preview(&self, text: &str) -> Result<TokenPreview> {
        Ok(TokenPreview {
            original: text.to_string(),
            tokenized: self.tokenize_merchant(text, None, None)?,
            description: self.tokenize_description(text)?,
        })
    }
}

fn non_empty_str<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> Tokenizer {
        let db = Database::in_memory().unwrap();
        Tokenizer::new(db).unwrap()
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn person_tokens(text: &str) -> Vec<String> {
        Regex::new(r"PERSON_[0-9]{3}")
            .unwrap()
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_same_merchant_same_token() {
        let t = setup();
        let a = t.tokenize_merchant("Whole Foods", None, None).unwrap();
        let b = t.tokenize_merchant("whole foods", None, None).unwrap();
        let c = t.tokenize_merchant("  WHOLE FOODS ", None, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);

        let other = t.tokenize_merchant("Trader Joes", None, None).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_merchant_token_format_and_sequence() {
        let t = setup();
        let re = Regex::new(r"^MERCHANT_[0-9]{4}$").unwrap();

        let first = t.tokenize_merchant("Alpha", None, None).unwrap();
        let second = t.tokenize_merchant("Beta", None, None).unwrap();
        let third = t.tokenize_merchant("Gamma", None, None).unwrap();

        assert!(re.is_match(&first));
        assert_eq!(first, "MERCHANT_0001");
        assert_eq!(second, "MERCHANT_0002");
        assert_eq!(third, "MERCHANT_0003");
        assert_eq!(first.len(), 13);
    }

    #[test]
    fn test_original_value_is_first_seen_form() {
        let t = setup();
        let token = t.tokenize_merchant("Whole Foods", None, None).unwrap();
        t.tokenize_merchant("WHOLE FOODS", None, None).unwrap();
        assert_eq!(t.original_value(&token).as_deref(), Some("Whole Foods"));
        assert_eq!(t.detokenize(&token), "Whole Foods");
    }

    #[test]
    fn test_merchant_metadata_stored() {
        let t = setup();
        let token = t
            .tokenize_merchant("Whole Foods", Some("Groceries"), Some("Supermarket"))
            .unwrap();
        let stored = t.db.get_token(&token).unwrap().unwrap();
        let metadata = stored.metadata.unwrap();
        assert_eq!(metadata.get("category").map(String::as_str), Some("Groceries"));
        assert_eq!(metadata.get("subcategory").map(String::as_str), Some("Supermarket"));
    }

    #[test]
    fn test_account_tokens() {
        let t = setup();
        let token = t.tokenize_account("Chase Checking", Some("checking")).unwrap();
        assert_eq!(token, "ACCOUNT_001");
        assert_eq!(t.tokenize_account("chase checking", None).unwrap(), token);

        let stored = t.db.get_token(&token).unwrap().unwrap();
        assert_eq!(
            stored.metadata.unwrap().get("account_type").map(String::as_str),
            Some("checking")
        );
    }

    #[test]
    fn test_venmo_description() {
        let t = setup();
        let result = t.tokenize_description("VENMO PAYMENT JOHN SMITH").unwrap();
        assert_eq!(result, "VENMO PERSON_001");
    }

    #[test]
    fn test_same_person_across_services() {
        let t = setup();
        let venmo = t.tokenize_description("VENMO PAYMENT JOHN SMITH").unwrap();
        let zelle = t.tokenize_description("ZELLE TO JOHN SMITH").unwrap();

        assert_eq!(zelle, "ZELLE PERSON_001");
        assert_eq!(person_tokens(&venmo), person_tokens(&zelle));
    }

    #[test]
    fn test_description_keyword_case_insensitive() {
        let t = setup();
        let result = t.tokenize_description("Venmo payment Jane Doe").unwrap();
        assert_eq!(result, "VENMO PERSON_001");
        assert_eq!(t.detokenize(&result), "VENMO JANE DOE");
    }

    #[test]
    fn test_paypal_and_cash_app() {
        let t = setup();
        assert_eq!(
            t.tokenize_description("PAYPAL *MARY JONES").unwrap(),
            "PAYPAL PERSON_001"
        );
        assert_eq!(
            t.tokenize_description("CASH APP *BOB LEE").unwrap(),
            "CASH APP PERSON_002"
        );
    }

    #[test]
    fn test_trailing_text_keeps_its_separator() {
        let t = setup();
        let result = t.tokenize_description("ZELLE FROM ANNA KIM 12345").unwrap();
        assert_eq!(result, "ZELLE PERSON_001 12345");
    }

    #[test]
    fn test_description_without_person_unchanged() {
        let t = setup();
        let text = "AMAZON MKTPLACE PMTS";
        assert_eq!(t.tokenize_description(text).unwrap(), text);
        assert_eq!(t.get_token_stats().unwrap().people, 0);
    }

    #[test]
    fn test_date_shift_round_trip() {
        let t = setup();
        let original = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let shifted = t.shift_date(original).unwrap();
        assert!(shifted > original);
        assert_eq!(t.shift_date(original).unwrap(), shifted);
        assert_eq!(t.unshift_date(shifted).unwrap(), original);

        let days = (shifted - original).num_days();
        assert!((DATE_SHIFT_MIN_DAYS..=DATE_SHIFT_MAX_DAYS).contains(&days));
    }

    #[test]
    fn test_date_shift_persists_across_engines() {
        let db = Database::in_memory().unwrap();
        let first = Tokenizer::new(db.clone()).unwrap();
        let shift = first.date_shift_days().unwrap();

        let second = Tokenizer::new(db).unwrap();
        assert_eq!(second.date_shift_days().unwrap(), shift);
        assert_eq!(second.get_token_stats().unwrap().date_shift_days, shift);
    }

    #[test]
    fn test_detokenize_multiple_and_unknown() {
        let t = setup();
        let wf = t.tokenize_merchant("Whole Foods", None, None).unwrap();
        let tj = t.tokenize_merchant("Trader Joes", None, None).unwrap();

        let text = format!("Compare {} vs {} and MERCHANT_9999", wf, tj);
        assert_eq!(
            t.detokenize(&text),
            "Compare Whole Foods vs Trader Joes and MERCHANT_9999"
        );
        assert_eq!(t.detokenize("no tokens here"), "no tokens here");
    }

    #[test]
    fn test_detokenize_past_padding_width() {
        let db = Database::in_memory().unwrap();
        for i in 1..=1000 {
            let name = format!("PERSON NUMBER {}", i);
            db.create_token(TokenType::Person, &name, &name, None).unwrap();
        }
        let t = Tokenizer::new(db).unwrap();

        assert_eq!(t.detokenize("PERSON_1000"), "PERSON NUMBER 1000");
        assert_eq!(t.detokenize("PERSON_100"), "PERSON NUMBER 100");
        assert_eq!(
            t.detokenize("PERSON_1000 paid PERSON_001"),
            "PERSON NUMBER 1000 paid PERSON NUMBER 1"
        );
        assert_eq!(t.detokenize("MERCHANT_00001"), "MERCHANT_00001");
    }

    #[test]
    fn test_detokenize_json() {
        let t = setup();
        let token = t.tokenize_merchant("Netflix", None, None).unwrap();
        let response = json!({
            "findings": [{"merchant": token, "note": format!("{} raised prices", token)}],
            "count": 1
        });
        let restored = t.detokenize_json(&response);
        assert_eq!(restored["findings"][0]["merchant"], "Netflix");
        assert_eq!(restored["findings"][0]["note"], "Netflix raised prices");
        assert_eq!(restored["count"], 1);
    }

    #[test]
    fn test_tokenize_transaction_for_ai() {
        let t = setup();
        let record = as_map(json!({
            "clean_merchant": "Whole Foods",
            "raw_description": "WHOLEFDS MKT 10234",
            "amount": -187.34,
            "date": "2024-01-15",
            "category_name": "Groceries",
            "account_name": "Chase Checking",
            "account_type": "checking",
        }));

        let result = t.tokenize_transaction_for_ai(&record, true).unwrap();

        let merchant = result["merchant"].as_str().unwrap();
        assert!(merchant.starts_with("MERCHANT_"));
        assert!(merchant.ends_with(" [Groceries]"));
        assert_eq!(result["amount"], json!(-187.34));
        assert_ne!(result["date"], json!("2024-01-15"));
        assert!(result["account"].as_str().unwrap().starts_with("ACCOUNT_"));
        assert!(!result.contains_key("clean_merchant"));
        assert!(!result.contains_key("raw_description"));
        assert!(!result.contains_key("account_name"));
        assert!(!result.contains_key("account_type"));
        assert_eq!(result["category_name"], json!("Groceries"));

        // Input untouched
        assert_eq!(record["date"], json!("2024-01-15"));

        let shifted = NaiveDate::parse_from_str(result["date"].as_str().unwrap(), "%Y-%m-%d")
            .unwrap();
        assert_eq!(
            t.unshift_date(shifted).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_tokenize_transaction_without_category() {
        let t = setup();
        let record = as_map(json!({
            "merchant": "Shell",
            "category_name": "Gas",
            "description": "VENMO JOHN SMITH",
        }));
        let result = t.tokenize_transaction_for_ai(&record, false).unwrap();
        assert_eq!(result["merchant"], json!("MERCHANT_0001"));
        assert_eq!(result["description"], json!("VENMO PERSON_001"));
    }

    #[test]
    fn test_tokenize_transaction_keeps_datetime_format() {
        let t = setup();
        let record = as_map(json!({"date": "2024-01-15T08:30:00"}));
        let result = t.tokenize_transaction_for_ai(&record, true).unwrap();
        let expected = format!(
            "{}T08:30:00",
            t.shift_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
                .unwrap()
                .format("%Y-%m-%d")
        );
        assert_eq!(result["date"], json!(expected));
    }

    #[test]
    fn test_tokenize_transaction_rejects_bad_date() {
        let t = setup();
        let record = as_map(json!({"date": "last tuesday"}));
        assert!(t.tokenize_transaction_for_ai(&record, true).is_err());
    }

    #[test]
    fn test_get_unknown_merchants() {
        let t = setup();
        t.tokenize_merchant("Whole Foods", None, None).unwrap();
        t.tokenize_merchant("Trader Joes", None, None).unwrap();

        let names = ["Whole Foods", "Target", "costco", "TRADER JOES "];
        let unknown = t.get_unknown_merchants(&names).unwrap();
        assert_eq!(unknown, vec!["Target".to_string(), "costco".to_string()]);
    }

    #[test]
    fn test_anonymize_for_provider_respects_settings() {
        let t = setup();
        let records = vec![as_map(json!({"merchant": "Whole Foods", "amount": -10}))];
        let settings = PrivacySettings::default();

        let local = t
            .anonymize_for_provider(&records, AiProvider::Ollama, &settings, true)
            .unwrap();
        assert_eq!(local[0]["merchant"], json!("Whole Foods"));

        let cloud = t
            .anonymize_for_provider(&records, AiProvider::Anthropic, &settings, true)
            .unwrap();
        assert_eq!(cloud[0]["merchant"], json!("MERCHANT_0001"));
    }

    #[test]
    fn test_refresh_sees_tokens_from_other_engine() {
        let db = Database::in_memory().unwrap();
        let reader = Tokenizer::new(db.clone()).unwrap();
        let writer = Tokenizer::new(db).unwrap();

        let token = writer.tokenize_merchant("Costco", None, None).unwrap();
        assert_eq!(reader.detokenize(&token), token);

        reader.refresh().unwrap();
        assert_eq!(reader.detokenize(&token), "Costco");
    }

    #[test]
    fn test_preview() {
        let t = setup();
        let preview = t.preview("ZELLE TO JOHN SMITH").unwrap();
        assert_eq!(preview.original, "ZELLE TO JOHN SMITH");
        assert_eq!(preview.tokenized, "MERCHANT_0001");
        assert_eq!(preview.description, "ZELLE PERSON_001");
    }
}
