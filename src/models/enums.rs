use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The wire name doubles as the serde name so stored runs and CLI input agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentType {
    Form16 => "FORM_16",
    BankInterest => "BANK_INT",
    Form26As => "FORM_26AS",
    Other => "OTHER",
});

str_enum!(TaxRegime {
    Old => "OLD",
    New => "NEW",
});

str_enum!(StepStatus {
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

str_enum!(FilingState {
    Pending => "PENDING",
    NeedsReview => "NEEDS_REVIEW",
    EVerified => "E_VERIFIED",
    Failed => "FAILED",
});

str_enum!(ScenarioType {
    SalariedBasic => "SALARIED_BASIC",
    HighEarner => "HIGH_EARNER",
    ComplexCapitalGains => "COMPLEX_CAPITAL_GAINS",
    SeniorCitizen => "SENIOR_CITIZEN",
});

str_enum!(RiskLevel {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

str_enum!(Stage {
    Supervisor => "SUPERVISOR",
    DocumentClassifier => "DOCUMENT_CLASSIFIER",
    FieldExtraction => "FIELD_EXTRACTION",
    IncomeValidator => "INCOME_VALIDATOR",
    IncomeAggregator => "INCOME_AGGREGATOR",
    ScenarioRouter => "SCENARIO_ROUTER",
    DeductionClaimer => "DEDUCTION_CLAIMER",
    TaxComputation => "TAX_COMPUTATION",
    FormFiller => "FORM_FILLER",
    FormValidator => "FORM_VALIDATOR",
    ConsensusValidator => "CONSENSUS_VALIDATOR",
    EVerification => "E_VERIFICATION",
});

impl TaxRegime {
    /// The old regime allows itemized deductions; the new one is flat.
    pub fn is_itemized(&self) -> bool {
        matches!(self, Self::Old)
    }

    pub fn alternate(&self) -> TaxRegime {
        match self {
            Self::Old => Self::New,
            Self::New => Self::Old,
        }
    }
}

impl Default for TaxRegime {
    fn default() -> Self {
        Self::Old
    }
}

impl ScenarioType {
    /// Lenient mapping from free-form labels; anything unknown is the basic bucket.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_uppercase().replace([' ', '-'], "_");
        normalized
            .parse()
            .unwrap_or(Self::SalariedBasic)
    }
}

impl RiskLevel {
    pub fn from_label(label: &str) -> Self {
        label.trim().to_uppercase().parse().unwrap_or(Self::Low)
    }
}
