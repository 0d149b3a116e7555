//! Subject (distinguished name) composition.
//!
//! Attribute values reach the builder in one of two shapes: a single
//! comma-separated string, or a list of atomic values from a repeated flag.
//! Both are normalized into an [`AttributeList`] before anything else sees
//! them, so the encoder only ever deals with one representation.

use crate::error::{CertToolError, Result};
use const_oid::db::rfc4519;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec};
use der::{Tag, Tagged};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

/// PKCS#9 emailAddress attribute (1.2.840.113549.1.9.1).
pub const EMAIL_ADDRESS_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// Ordered list of values for one subject attribute.
///
/// Empty values are never stored, so an attribute given as `""` simply does
/// not appear in the encoded name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList(Vec<String>);

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a comma-separated string. No escaping is recognized.
    ///
    /// # Example
    ///
    /// ```
    /// use cert_tools::cert::subject::AttributeList;
    ///
    /// let list = AttributeList::from_comma_separated("Ops,Security");
    /// assert_eq!(list.as_slice(), ["Ops", "Security"]);
    /// assert!(AttributeList::from_comma_separated("").is_empty());
    /// ```
    pub fn from_comma_separated(input: &str) -> Self {
        Self::from_values(input.split(','))
    }

    /// Take values from a repeated flag, one value per occurrence.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            values
                .into_iter()
                .map(Into::into)
                .filter(|v: &String| !v.is_empty())
                .collect(),
        )
    }

    pub fn push(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.0.push(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Case-sensitive substring test across all values.
    pub fn any_contains(&self, needle: &str) -> bool {
        self.0.iter().any(|v| v.contains(needle))
    }
}

impl From<Vec<String>> for AttributeList {
    fn from(values: Vec<String>) -> Self {
        Self::from_values(values)
    }
}

/// A certificate subject with multi-valued attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    pub country: AttributeList,
    pub province: AttributeList,
    pub locality: AttributeList,
    pub street_address: AttributeList,
    pub postal_code: AttributeList,
    pub organization: AttributeList,
    pub organizational_unit: AttributeList,
    pub common_name: String,
    pub email_address: AttributeList,
}

impl Subject {
    /// Encode as an X.509 name.
    ///
    /// Each value becomes its own single-valued RDN, in the order C, ST, L,
    /// STREET, postalCode, O, OU, CN, emailAddress. Input order is kept
    /// within an attribute.
    pub fn to_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();

        push_rdns(&mut rdns, rfc4519::C, &self.country)?;
        push_rdns(&mut rdns, rfc4519::ST, &self.province)?;
        push_rdns(&mut rdns, rfc4519::L, &self.locality)?;
        push_rdns(&mut rdns, rfc4519::STREET, &self.street_address)?;
        push_rdns(&mut rdns, rfc4519::POSTAL_CODE, &self.postal_code)?;
        push_rdns(&mut rdns, rfc4519::O, &self.organization)?;
        push_rdns(&mut rdns, rfc4519::OU, &self.organizational_unit)?;
        if !self.common_name.is_empty() {
            rdns.push(single_rdn(rfc4519::CN, &self.common_name)?);
        }
        push_rdns(&mut rdns, EMAIL_ADDRESS_OID, &self.email_address)?;

        Ok(RdnSequence(rdns))
    }

    /// Decode the attributes this toolkit understands from an X.509 name.
    ///
    /// Unknown attribute types and non-string values are skipped. When a
    /// name carries several common names the last one wins.
    pub fn from_name(name: &Name) -> Self {
        let mut subject = Subject::default();

        for rdn in name.0.iter() {
            for atv in rdn.0.iter() {
                let Some(text) = attribute_text(&atv.value) else {
                    continue;
                };
                match atv.oid {
                    oid if oid == rfc4519::C => subject.country.push(text),
                    oid if oid == rfc4519::ST => subject.province.push(text),
                    oid if oid == rfc4519::L => subject.locality.push(text),
                    oid if oid == rfc4519::STREET => subject.street_address.push(text),
                    oid if oid == rfc4519::POSTAL_CODE => subject.postal_code.push(text),
                    oid if oid == rfc4519::O => subject.organization.push(text),
                    oid if oid == rfc4519::OU => subject.organizational_unit.push(text),
                    oid if oid == rfc4519::CN => subject.common_name = text,
                    oid if oid == EMAIL_ADDRESS_OID => subject.email_address.push(text),
                    _ => {}
                }
            }
        }

        subject
    }

    /// Whether `needle` occurs in any of CN, O, OU, C, L, ST, postalCode or
    /// STREET. Case-sensitive; one matching field is enough.
    pub fn contains(&self, needle: &str) -> bool {
        self.common_name.contains(needle)
            || self.organizational_unit.any_contains(needle)
            || self.organization.any_contains(needle)
            || self.country.any_contains(needle)
            || self.locality.any_contains(needle)
            || self.province.any_contains(needle)
            || self.postal_code.any_contains(needle)
            || self.street_address.any_contains(needle)
    }
}

/// Chained construction of a [`Subject`].
///
/// # Example
///
/// ```
/// use cert_tools::cert::subject::{AttributeList, SubjectBuilder};
///
/// let subject = SubjectBuilder::new()
///     .country(AttributeList::from_comma_separated("GB"))
///     .organization(AttributeList::from_values(["Example Ltd"]))
///     .common_name("Example Root CA")
///     .build();
/// assert_eq!(subject.country.as_slice(), ["GB"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SubjectBuilder {
    subject: Subject,
}

impl SubjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn country(mut self, values: AttributeList) -> Self {
        self.subject.country = values;
        self
    }

    pub fn province(mut self, values: AttributeList) -> Self {
        self.subject.province = values;
        self
    }

    pub fn locality(mut self, values: AttributeList) -> Self {
        self.subject.locality = values;
        self
    }

    pub fn street_address(mut self, values: AttributeList) -> Self {
        self.subject.street_address = values;
        self
    }

    pub fn postal_code(mut self, values: AttributeList) -> Self {
        self.subject.postal_code = values;
        self
    }

    pub fn organization(mut self, values: AttributeList) -> Self {
        self.subject.organization = values;
        self
    }

    pub fn organizational_unit(mut self, values: AttributeList) -> Self {
        self.subject.organizational_unit = values;
        self
    }

    pub fn common_name(mut self, common_name: impl Into<String>) -> Self {
        self.subject.common_name = common_name.into();
        self
    }

    pub fn build(self) -> Subject {
        self.subject
    }
}

fn push_rdns(
    rdns: &mut Vec<RelativeDistinguishedName>,
    oid: ObjectIdentifier,
    values: &AttributeList,
) -> Result<()> {
    for value in values.iter() {
        rdns.push(single_rdn(oid, value)?);
    }
    Ok(())
}

pub(crate) fn single_rdn(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let atv = AttributeTypeAndValue {
        oid,
        value: encode_attribute_value(oid, value)?,
    };

    let mut attr_set = SetOfVec::new();
    attr_set
        .insert(atv)
        .map_err(|e| CertToolError::EncodingError(format!("Failed to add attribute: {}", e)))?;

    Ok(RelativeDistinguishedName::from(attr_set))
}

/// emailAddress is an IA5String; everything else is a PrintableString when
/// the text allows it and a UTF8String otherwise.
pub(crate) fn encode_attribute_value(oid: ObjectIdentifier, value: &str) -> Result<Any> {
    let tag = if oid == EMAIL_ADDRESS_OID && value.is_ascii() {
        Tag::Ia5String
    } else if value.chars().all(is_printable_char) {
        Tag::PrintableString
    } else {
        Tag::Utf8String
    };

    Any::new(tag, value.as_bytes().to_vec()).map_err(|e| {
        CertToolError::EncodingError(format!("Invalid attribute value '{}': {}", value, e))
    })
}

fn is_printable_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            ' ' | '\'' | '(' | ')' | '+' | ',' | '-' | '.' | '/' | ':' | '=' | '?'
        )
}

/// Text of a directory string value, if it is one.
pub(crate) fn attribute_text(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(value.value()).ok().map(str::to_owned)
        }
        Tag::BmpString => {
            let units: Vec<u16> = value
                .value()
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, Encode};
    use proptest::prelude::*;

    fn attribute_count(name: &Name) -> usize {
        name.0.iter().map(|rdn| rdn.0.len()).sum()
    }

    #[test]
    fn test_comma_separated_adapter() {
        let list = AttributeList::from_comma_separated("A,B,C");
        assert_eq!(list.as_slice(), ["A", "B", "C"]);
    }

    #[test]
    fn test_comma_separated_drops_empty_segments() {
        assert!(AttributeList::from_comma_separated("").is_empty());
        assert_eq!(
            AttributeList::from_comma_separated("A,,B").as_slice(),
            ["A", "B"]
        );
    }

    #[test]
    fn test_repeated_adapter_matches_comma_adapter() {
        let repeated = AttributeList::from_values(vec!["Ops".to_string(), "Sec".to_string()]);
        let comma = AttributeList::from_comma_separated("Ops,Sec");
        assert_eq!(repeated, comma);
    }

    #[test]
    fn test_empty_attributes_are_omitted() {
        let subject = SubjectBuilder::new()
            .country(AttributeList::from_comma_separated(""))
            .organization(AttributeList::new())
            .common_name("only-cn")
            .build();

        let name = subject.to_name().unwrap();
        assert_eq!(attribute_count(&name), 1);
        assert_eq!(name.0[0].0.iter().next().unwrap().oid, rfc4519::CN);
    }

    #[test]
    fn test_empty_common_name_is_omitted() {
        let subject = SubjectBuilder::new()
            .organization(AttributeList::from_values(["Org"]))
            .build();

        let name = subject.to_name().unwrap();
        assert_eq!(attribute_count(&name), 1);
    }

    #[test]
    fn test_attribute_order() {
        let subject = SubjectBuilder::new()
            .common_name("cn")
            .organizational_unit(AttributeList::from_values(["ou1", "ou2"]))
            .organization(AttributeList::from_values(["o"]))
            .locality(AttributeList::from_values(["l"]))
            .province(AttributeList::from_values(["st"]))
            .country(AttributeList::from_values(["GB"]))
            .build();

        let name = subject.to_name().unwrap();
        let oids: Vec<_> = name
            .0
            .iter()
            .map(|rdn| rdn.0.iter().next().unwrap().oid)
            .collect();
        assert_eq!(
            oids,
            vec![
                rfc4519::C,
                rfc4519::ST,
                rfc4519::L,
                rfc4519::O,
                rfc4519::OU,
                rfc4519::OU,
                rfc4519::CN
            ]
        );
    }

    #[test]
    fn test_name_roundtrip_through_der() {
        let subject = SubjectBuilder::new()
            .country(AttributeList::from_comma_separated("GB,IE"))
            .organization(AttributeList::from_values(["Müller GmbH"]))
            .common_name("Example")
            .build();

        let der = subject.to_name().unwrap().to_der().unwrap();
        let decoded = Subject::from_name(&Name::from_der(&der).unwrap());
        assert_eq!(decoded, subject);
    }

    #[test]
    fn test_string_types() {
        let printable = encode_attribute_value(rfc4519::O, "Example Ltd").unwrap();
        assert_eq!(printable.tag(), Tag::PrintableString);

        let utf8 = encode_attribute_value(rfc4519::O, "Ex@mple").unwrap();
        assert_eq!(utf8.tag(), Tag::Utf8String);

        let email = encode_attribute_value(EMAIL_ADDRESS_OID, "a@example.com").unwrap();
        assert_eq!(email.tag(), Tag::Ia5String);
    }

    #[test]
    fn test_contains_checks_every_field() {
        let subject = Subject {
            postal_code: AttributeList::from_values(["SW1A 1AA"]),
            street_address: AttributeList::from_values(["1 High Street"]),
            ..Default::default()
        };

        assert!(subject.contains("SW1A"));
        assert!(subject.contains("High"));
        assert!(!subject.contains("high"));
        assert!(!subject.contains("Nowhere"));
    }

    proptest! {
        #[test]
        fn prop_no_empty_attribute_is_encoded(
            country in "[A-Z,]{0,8}",
            orgs in prop::collection::vec("[A-Za-z0-9 ]{0,6}", 0..4),
            cn in "[a-z]{0,6}",
        ) {
            let subject = SubjectBuilder::new()
                .country(AttributeList::from_comma_separated(&country))
                .organization(AttributeList::from_values(orgs.clone()))
                .common_name(cn.clone())
                .build();

            let name = subject.to_name().unwrap();
            for rdn in name.0.iter() {
                for atv in rdn.0.iter() {
                    prop_assert!(!atv.value.value().is_empty());
                }
            }

            let expected = country.split(',').filter(|c| !c.is_empty()).count()
                + orgs.iter().filter(|o| !o.is_empty()).count()
                + usize::from(!cn.is_empty());
            prop_assert_eq!(attribute_count(&name), expected);

            let decoded = Subject::from_name(&name);
            prop_assert_eq!(decoded, subject);
        }
    }
}
