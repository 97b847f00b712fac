//! Domain models for cloak

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of sensitive value a token stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Merchant,
    Account,
    Person,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant",
            Self::Account => "account",
            Self::Person => "person",
        }
    }

    /// Uppercase prefix used in the token text
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Merchant => "MERCHANT",
            Self::Account => "ACCOUNT",
            Self::Person => "PERSON",
        }
    }

    /// Zero-padded width of the sequence number.
    ///
    /// Part of the detokenize wire contract: previously issued tokens only
    /// round-trip if these widths never change.
    pub fn width(&self) -> usize {
        match self {
            Self::Merchant => 4,
            Self::Account | Self::Person => 3,
        }
    }

    /// Render the token text for a sequence number, e.g. `MERCHANT_0042`
    pub fn format_token(&self, seq: i64) -> String {
        format!("{}_{:0width$}", self.prefix(), seq, width = self.width())
    }

    pub fn all() -> &'static [TokenType] {
        &[Self::Merchant, Self::Account, Self::Person]
    }
}

impl std::str::FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merchant" | "merchants" => Ok(Self::Merchant),
            "account" | "accounts" => Ok(Self::Account),
            "person" | "people" => Ok(Self::Person),
            _ => Err(format!("Unknown token type: {}", s)),
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Free-form annotations stored with a token (category, account_type, ...)
pub type TokenMetadata = BTreeMap<String, String>;

/// A stable pseudonym for a sensitive value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: i64,
    pub token_type: TokenType,
    /// The value as first seen; never rewritten
    pub original_value: String,
    /// Trimmed, uppercased lookup key
    pub normalized_value: String,
    pub token: String,
    pub metadata: Option<TokenMetadata>,
    pub created_at: DateTime<Utc>,
}

/// Installation-wide date offset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateShift {
    pub shift_days: i64,
    pub created_at: DateTime<Utc>,
}

/// Token counts per type plus the date shift in use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStats {
    pub merchants: i64,
    pub accounts: i64,
    pub people: i64,
    /// 0 until the shift has been generated
    pub date_shift_days: i64,
}

/// How a piece of text would leave the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPreview {
    pub original: String,
    /// Text tokenized as a merchant name
    pub tokenized: String,
    /// Text with embedded person names tokenized
    pub description: String,
}

/// A bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: Option<AccountType>,
    pub created_at: DateTime<Utc>,
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" | "credit_card" => Ok(Self::Credit),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

/// A parsed transaction record as handed over by a file parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(alias = "description")]
    pub raw_description: String,
    #[serde(default)]
    pub clean_merchant: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A transaction ready for insertion
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub raw_description: String,
    pub clean_merchant: Option<String>,
    pub category: Option<String>,
    /// Fingerprint used for deduplication
    pub import_hash: String,
}

/// A stored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub raw_description: String,
    pub clean_merchant: Option<String>,
    pub category: Option<String>,
    pub import_hash: String,
    pub recurring_group_id: Option<i64>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an import batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: i64,
    /// Duplicates, whether caught by the hash check or by the unique index
    pub skipped: i64,
    pub errors: Vec<String>,
}

/// Recurring charge frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" | "bi-weekly" | "fortnightly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A repeating charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringGroup {
    pub id: i64,
    pub name: String,
    pub merchant_pattern: String,
    pub expected_amount: Option<Decimal>,
    /// Acceptable variance in percent
    pub amount_variance: Option<Decimal>,
    /// `None` when the stored value is not a known frequency
    pub frequency: Option<Frequency>,
    pub last_seen_date: Option<NaiveDate>,
    pub next_expected_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a recurring group
#[derive(Debug, Clone)]
pub struct NewRecurringGroup {
    pub name: String,
    pub merchant_pattern: String,
    pub expected_amount: Option<Decimal>,
    pub amount_variance: Option<Decimal>,
    pub frequency: Frequency,
    pub last_seen_date: Option<NaiveDate>,
}

/// A recurring pattern reported by an AI detection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringDetection {
    pub suggested_name: String,
    pub merchant_pattern: String,
    pub average_amount: Decimal,
    pub frequency: String,
    #[serde(default)]
    pub transaction_ids: Vec<i64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Where to attach a transaction being marked recurring
#[derive(Debug, Clone)]
pub enum RecurringTarget {
    Existing(i64),
    New {
        name: Option<String>,
        frequency: Option<Frequency>,
    },
}

/// AI providers records may be sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Ollama,
    OpenRouter,
    Anthropic,
    OpenAI,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }

    pub fn all() -> &'static [AiProvider] {
        &[Self::Ollama, Self::OpenRouter, Self::Anthropic, Self::OpenAI]
    }

    /// Runs on this machine, so data never leaves it
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama)
    }
}

impl std::str::FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openrouter" => Ok(Self::OpenRouter),
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            _ => Err(format!("Unknown AI provider: {}", s)),
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Obfuscation toggles, one master switch plus one per provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub obfuscation_enabled: bool,
    pub ollama_obfuscation: bool,
    pub openrouter_obfuscation: bool,
    pub anthropic_obfuscation: bool,
    pub openai_obfuscation: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            obfuscation_enabled: true,
            ollama_obfuscation: false,
            openrouter_obfuscation: true,
            anthropic_obfuscation: true,
            openai_obfuscation: true,
        }
    }
}

impl PrivacySettings {
    pub fn provider_enabled(&self, provider: AiProvider) -> bool {
        match provider {
            AiProvider::Ollama => self.ollama_obfuscation,
            AiProvider::OpenRouter => self.openrouter_obfuscation,
            AiProvider::Anthropic => self.anthropic_obfuscation,
            AiProvider::OpenAI => self.openai_obfuscation,
        }
    }

    pub fn set_provider(&mut self, provider: AiProvider, enabled: bool) {
        match provider {
            AiProvider::Ollama => self.ollama_obfuscation = enabled,
            AiProvider::OpenRouter => self.openrouter_obfuscation = enabled,
            AiProvider::Anthropic => self.anthropic_obfuscation = enabled,
            AiProvider::OpenAI => self.openai_obfuscation = enabled,
        }
    }

    /// Whether records bound for `provider` must be tokenized first
    pub fn should_obfuscate(&self, provider: AiProvider) -> bool {
        self.obfuscation_enabled && self.provider_enabled(provider)
    }

    pub fn providers(&self) -> Vec<ProviderPrivacy> {
        AiProvider::all()
            .iter()
            .map(|&provider| ProviderPrivacy {
                provider,
                obfuscation_enabled: self.provider_enabled(provider),
            })
            .collect()
    }
}

/// Obfuscation toggle for a single provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPrivacy {
    pub provider: AiProvider,
    pub obfuscation_enabled: bool,
}

/// Partial update of privacy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacySettingsUpdate {
    pub obfuscation_enabled: Option<bool>,
    #[serde(default)]
    pub provider_settings: Vec<ProviderPrivacy>,
}
