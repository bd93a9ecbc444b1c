use bmh_domain::keys::HARDWAREDATA_PREFIX;
use bmh_domain::HardwareDetails;

use crate::error::SelectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringQualifier {
    Exact,
    ICase,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl NumericOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "gt" | ">" => Some(Self::Gt),
            "gte" | ">=" => Some(Self::Gte),
            "lt" | "<" => Some(Self::Lt),
            "lte" | "<=" => Some(Self::Lte),
            "eq" | "==" => Some(Self::Eq),
            "neq" | "!=" => Some(Self::Neq),
            _ => None,
        }
    }

    fn apply(&self, lhs: i128, rhs: i128) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Neq => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementOp {
    Eq,
    NotEq,
    Contains,
    NotContains,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ElementOp {
    /// Split `"<field><op><value>"` on the longest operator token it
    /// contains. Order matters: two-character tokens must be tried before
    /// their one-character prefixes (`!=` before `!~`'s `~`... `>=`/`<=`
    /// before `>`/`<`).
    fn split(text: &str) -> Option<(&str, Self, &str)> {
        const TOKENS: &[(&str, ElementOp)] = &[
            (">=", ElementOp::Gte),
            ("<=", ElementOp::Lte),
            ("==", ElementOp::Eq),
            ("!=", ElementOp::NotEq),
            ("!~", ElementOp::NotContains),
            ("=", ElementOp::Eq),
            ("~", ElementOp::Contains),
            (">", ElementOp::Gt),
            ("<", ElementOp::Lt),
        ];
        for (token, op) in TOKENS {
            if let Some(idx) = text.find(token) {
                return Some((&text[..idx], *op, &text[idx + token.len()..]));
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
struct ElementPredicate {
    field: String,
    op: ElementOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionAction {
    Present,
    Absent,
    Count,
}

enum ElementValue<'a> {
    Str(&'a str),
    Num(i128),
    List(&'a [String]),
}

fn evaluate_element(value: &ElementValue<'_>, op: ElementOp, rhs: &str) -> bool {
    match value {
        ElementValue::Str(s) => match op {
            ElementOp::Eq => *s == rhs,
            ElementOp::NotEq => *s != rhs,
            ElementOp::Contains => s.contains(rhs),
            ElementOp::NotContains => !s.contains(rhs),
            ElementOp::Gt | ElementOp::Gte | ElementOp::Lt | ElementOp::Lte => false,
        },
        ElementValue::Num(n) => match rhs.parse::<i128>() {
            Ok(target) => match op {
                ElementOp::Eq => *n == target,
                ElementOp::NotEq => *n != target,
                ElementOp::Gt => *n > target,
                ElementOp::Gte => *n >= target,
                ElementOp::Lt => *n < target,
                ElementOp::Lte => *n <= target,
                ElementOp::Contains | ElementOp::NotContains => false,
            },
            Err(_) => false,
        },
        ElementValue::List(items) => match op {
            ElementOp::Eq => items.iter().any(|i| i == rhs),
            ElementOp::NotEq => !items.iter().any(|i| i == rhs),
            ElementOp::Contains => items.iter().any(|i| i.contains(rhs)),
            ElementOp::NotContains => !items.iter().any(|i| i.contains(rhs)),
            ElementOp::Gt | ElementOp::Gte | ElementOp::Lt | ElementOp::Lte => false,
        },
    }
}

/// A parsed `hardwaredata/<field>[;<qualifier>…]` selector entry, ready to be
/// evaluated against a host's [`HardwareDetails`] without re-parsing.
enum Matcher {
    StringField { field: ScalarStringField, qualifier: StringQualifier },
    NumericField { field: ScalarNumericField, op: NumericOp },
    Collection { field: CollectionField, action: CollectionAction, predicates: Vec<ElementPredicate> },
}

#[derive(Debug, Clone, Copy)]
enum ScalarStringField {
    CpuArch,
    CpuModel,
    Manufacturer,
    ProductName,
    SerialNumber,
}

#[derive(Debug, Clone, Copy)]
enum ScalarNumericField {
    NumThreads,
    RamMebibytes,
}

#[derive(Debug, Clone, Copy)]
enum CollectionField {
    Nics,
    Storage,
}

/// Parse one selector-map entry whose key begins with [`HARDWAREDATA_PREFIX`].
/// `key` must include the prefix; `value` is the map's value for that key.
fn parse(key: &str, value: &str) -> Result<Matcher, SelectError> {
    let rest = key.strip_prefix(HARDWAREDATA_PREFIX).ok_or_else(|| SelectError::InvalidSelector {
        key: key.to_string(),
        reason: format!("missing '{HARDWAREDATA_PREFIX}' prefix"),
    })?;
    let mut parts = rest.split(';');
    let field = parts.next().unwrap_or("");
    let qualifiers: Vec<&str> = parts.collect();

    let invalid = |reason: &str| SelectError::InvalidSelector { key: key.to_string(), reason: reason.to_string() };

    match field {
        "cpuArch" | "cpuModel" | "manufacturer" | "productName" | "serialNumber" => {
            if qualifiers.len() > 1 {
                return Err(invalid("string fields accept at most one qualifier"));
            }
            let qualifier = match qualifiers.first() {
                None => StringQualifier::Exact,
                Some(&"icase") => StringQualifier::ICase,
                Some(&"substring") => StringQualifier::Substring,
                Some(other) => return Err(invalid(&format!("unknown string qualifier '{other}'"))),
            };
            let field = match field {
                "cpuArch" => ScalarStringField::CpuArch,
                "cpuModel" => ScalarStringField::CpuModel,
                "manufacturer" => ScalarStringField::Manufacturer,
                "productName" => ScalarStringField::ProductName,
                "serialNumber" => ScalarStringField::SerialNumber,
                _ => unreachable!(),
            };
            let _ = value;
            Ok(Matcher::StringField { field, qualifier })
        }
        "numThreads" | "ramMebibytes" => {
            if qualifiers.len() > 1 {
                return Err(invalid("numeric fields accept at most one qualifier"));
            }
            let op = match qualifiers.first() {
                None => NumericOp::Eq,
                Some(s) => NumericOp::parse(s).ok_or_else(|| invalid(&format!("unknown numeric qualifier '{s}'")))?,
            };
            let field = if field == "numThreads" { ScalarNumericField::NumThreads } else { ScalarNumericField::RamMebibytes };
            Ok(Matcher::NumericField { field, op })
        }
        "nics" | "storage" => {
            let action = match qualifiers.first() {
                Some(&"present") => CollectionAction::Present,
                Some(&"absent") => CollectionAction::Absent,
                Some(&"count") => CollectionAction::Count,
                Some(other) => return Err(invalid(&format!("unknown collection action '{other}'"))),
                None => return Err(invalid("nics/storage selectors require an action qualifier")),
            };
            let mut predicates = Vec::new();
            for q in &qualifiers[1..] {
                let (pfield, op, pvalue) =
                    ElementOp::split(q).ok_or_else(|| invalid(&format!("malformed element predicate '{q}'")))?;
                predicates.push(ElementPredicate { field: pfield.to_string(), op, value: pvalue.to_string() });
            }
            let field = if field == "nics" { CollectionField::Nics } else { CollectionField::Storage };
            Ok(Matcher::Collection { field, action, predicates })
        }
        other => Err(invalid(&format!("unknown hardware-data field '{other}'"))),
    }
}

fn nic_element_value<'a>(nic: &'a bmh_domain::NicInfo, field: &str) -> Option<ElementValue<'a>> {
    match field {
        "name" => Some(ElementValue::Str(&nic.name)),
        "model" => Some(ElementValue::Str(&nic.model)),
        "vendor" => Some(ElementValue::Str(&nic.vendor)),
        "speedGbps" => nic.speed_gbps.map(|g| ElementValue::Num(g as i128)),
        "alternateNames" => Some(ElementValue::List(&nic.alternate_names)),
        _ => None,
    }
}

fn storage_element_value<'a>(s: &'a bmh_domain::StorageInfo, field: &str) -> Option<ElementValue<'a>> {
    match field {
        "name" => Some(ElementValue::Str(&s.name)),
        "model" => Some(ElementValue::Str(&s.model)),
        "vendor" => Some(ElementValue::Str(&s.vendor)),
        "type" => Some(ElementValue::Str(&s.type_)),
        "sizeBytes" => Some(ElementValue::Num(s.size_bytes as i128)),
        _ => None,
    }
}

fn string_compare(actual: &str, qualifier: StringQualifier, target: &str) -> bool {
    match qualifier {
        StringQualifier::Exact => actual == target,
        StringQualifier::ICase => actual.eq_ignore_ascii_case(target),
        StringQualifier::Substring => actual.contains(target),
    }
}

impl Matcher {
    fn evaluate(&self, hw: &HardwareDetails, value: &str) -> bool {
        match self {
            Matcher::StringField { field, qualifier } => {
                let actual = match field {
                    ScalarStringField::CpuArch => &hw.cpu_arch,
                    ScalarStringField::CpuModel => &hw.cpu_model,
                    ScalarStringField::Manufacturer => &hw.manufacturer,
                    ScalarStringField::ProductName => &hw.product_name,
                    ScalarStringField::SerialNumber => &hw.serial_number,
                };
                string_compare(actual, *qualifier, value)
            }
            Matcher::NumericField { field, op } => {
                let actual: i128 = match field {
                    ScalarNumericField::NumThreads => hw.num_threads as i128,
                    ScalarNumericField::RamMebibytes => hw.ram_mebibytes as i128,
                };
                match value.parse::<i128>() {
                    Ok(target) => op.apply(actual, target),
                    Err(_) => false,
                }
            }
            Matcher::Collection { field, action, predicates } => {
                let count = match field {
                    CollectionField::Nics => hw
                        .nics
                        .iter()
                        .filter(|nic| {
                            predicates.iter().all(|p| {
                                nic_element_value(nic, &p.field)
                                    .map(|v| evaluate_element(&v, p.op, &p.value))
                                    .unwrap_or(false)
                            })
                        })
                        .count(),
                    CollectionField::Storage => hw
                        .storage
                        .iter()
                        .filter(|s| {
                            predicates.iter().all(|p| {
                                storage_element_value(s, &p.field)
                                    .map(|v| evaluate_element(&v, p.op, &p.value))
                                    .unwrap_or(false)
                            })
                        })
                        .count(),
                };
                match action {
                    CollectionAction::Present => count > 0,
                    CollectionAction::Absent => count == 0,
                    CollectionAction::Count => match NumericOp::split_count_expr(value) {
                        Some((op, target)) => op.apply(count as i128, target),
                        None => false,
                    },
                }
            }
        }
    }
}

impl NumericOp {
    /// Parse a `count` action's map value, e.g. `">=2"` or `"2"` (bare number
    /// defaults to `eq`, mirroring the numeric-field qualifier default).
    fn split_count_expr(value: &str) -> Option<(Self, i128)> {
        for (token, op) in [(">=", Self::Gte), ("<=", Self::Lte), ("==", Self::Eq), ("!=", Self::Neq), (">", Self::Gt), ("<", Self::Lt)] {
            if let Some(rest) = value.strip_prefix(token) {
                return rest.trim().parse::<i128>().ok().map(|n| (op, n));
            }
        }
        value.trim().parse::<i128>().ok().map(|n| (Self::Eq, n))
    }
}

/// Evaluate every `hardwaredata/…` selector entry against `hw`. Returns
/// `Ok(true)` only if all entries match; a malformed entry is the one
/// failure mode that surfaces as an error rather than a non-match (§4.D).
pub fn matches_hardware<'a>(
    hw: Option<&HardwareDetails>,
    entries: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<bool, SelectError> {
    let mut matchers = Vec::new();
    for (key, value) in entries {
        matchers.push((parse(key, value)?, value));
    }
    if matchers.is_empty() {
        return Ok(true);
    }
    let Some(hw) = hw else {
        return Ok(false);
    };
    Ok(matchers.iter().all(|(m, value)| m.evaluate(hw, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::{HardwareDetails, NicInfo, StorageInfo};

    fn sample_hw() -> HardwareDetails {
        HardwareDetails {
            cpu_arch: "x86_64".into(),
            cpu_model: "Xeon Gold 6338".into(),
            manufacturer: "Dell Inc.".into(),
            product_name: "PowerEdge R750".into(),
            serial_number: "SN123".into(),
            num_threads: 64,
            ram_mebibytes: 262144,
            bmc_address: "192.0.2.10".into(),
            nics: vec![
                NicInfo { name: "eth0".into(), mac_address: "aa:bb:cc:dd:ee:ff".into(), model: "X710".into(), vendor: "Intel".into(), speed_gbps: Some(10), alternate_names: vec!["enp1s0".into()] },
                NicInfo { name: "eth1".into(), mac_address: "11:22:33:44:55:66".into(), model: "BCM".into(), vendor: "Broadcom".into(), speed_gbps: Some(1), alternate_names: vec![] },
            ],
            storage: vec![StorageInfo { name: "sda".into(), model: "PERC".into(), vendor: "Dell".into(), type_: "SSD".into(), size_bytes: 1_000_000_000_000 }],
        }
    }

    #[test]
    fn string_field_exact_match() {
        let hw = sample_hw();
        assert!(matches_hardware(Some(&hw), [("hardwaredata/cpuArch", "x86_64")]).unwrap());
        assert!(!matches_hardware(Some(&hw), [("hardwaredata/cpuArch", "arm64")]).unwrap());
    }

    #[test]
    fn string_field_icase_and_substring() {
        let hw = sample_hw();
        assert!(matches_hardware(Some(&hw), [("hardwaredata/manufacturer;icase", "dell inc.")]).unwrap());
        assert!(matches_hardware(Some(&hw), [("hardwaredata/productName;substring", "R750")]).unwrap());
    }

    #[test]
    fn numeric_field_defaults_to_eq_and_supports_operators() {
        let hw = sample_hw();
        assert!(matches_hardware(Some(&hw), [("hardwaredata/numThreads", "64")]).unwrap());
        assert!(matches_hardware(Some(&hw), [("hardwaredata/ramMebibytes;gte", "131072")]).unwrap());
        assert!(!matches_hardware(Some(&hw), [("hardwaredata/numThreads;lt", "64")]).unwrap());
    }

    #[test]
    fn nics_present_with_element_predicate() {
        let hw = sample_hw();
        assert!(matches_hardware(Some(&hw), [("hardwaredata/nics;present;speedGbps>=10", "")]).unwrap());
        assert!(!matches_hardware(Some(&hw), [("hardwaredata/nics;present;speedGbps>=100", "")]).unwrap());
    }

    #[test]
    fn nics_count_action() {
        let hw = sample_hw();
        assert!(matches_hardware(Some(&hw), [("hardwaredata/nics;count;vendor=Intel", "==1")]).unwrap());
        assert!(matches_hardware(Some(&hw), [("hardwaredata/nics;count", "2")]).unwrap());
    }

    #[test]
    fn storage_absent_action() {
        let hw = sample_hw();
        assert!(matches_hardware(Some(&hw), [("hardwaredata/storage;absent;type=NVMe", "")]).unwrap());
    }

    #[test]
    fn malformed_qualifier_is_invalid_selector_error() {
        let hw = sample_hw();
        let err = matches_hardware(Some(&hw), [("hardwaredata/numThreads;bogus", "1")]).unwrap_err();
        assert!(matches!(err, SelectError::InvalidSelector { .. }));
    }

    #[test]
    fn missing_hardware_short_circuits_to_no_match_not_error() {
        assert!(!matches_hardware(None, [("hardwaredata/cpuArch", "x86_64")]).unwrap());
    }
}
