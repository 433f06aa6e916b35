use aerobook_shared::{Masked, PassengerId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// A traveller record. Created on first sight of an (id card, name) pair
/// and reused afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    pub name: String,
    pub id_card: Masked<String>,
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub contact_phone: Option<Masked<String>>,
}

/// Passenger identity as submitted with a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerInfo {
    pub name: String,
    pub id_card: Masked<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<Masked<String>>,
}

const MAX_NAME_CHARS: usize = 50;
const MAX_PHONE_CHARS: usize = 20;

impl PassengerInfo {
    pub fn new(name: impl Into<String>, id_card: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_card: Masked(id_card.into()),
            gender: None,
            birthday: None,
            nationality: None,
            contact_phone: None,
        }
    }

    /// Trim and canonicalize, rejecting malformed identity data. ID numbers
    /// are compared upper-cased, so `...002x` and `...002X` are one person.
    pub fn normalized(&self) -> Result<PassengerInfo, PassengerError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(PassengerError::MissingName);
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(PassengerError::NameTooLong(name.chars().count()));
        }

        let id_card = self.id_card.expose().trim().to_ascii_uppercase();
        if !(6..=18).contains(&id_card.len()) || !id_card.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(PassengerError::MalformedIdCard(Masked(id_card)));
        }

        let contact_phone = match &self.contact_phone {
            Some(phone) => {
                let phone = phone.expose().trim();
                let valid = !phone.is_empty()
                    && phone.chars().count() <= MAX_PHONE_CHARS
                    && phone.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ');
                if !valid {
                    return Err(PassengerError::MalformedPhone(Masked(phone.to_string())));
                }
                Some(Masked(phone.to_string()))
            }
            None => None,
        };

        Ok(PassengerInfo {
            name: name.to_string(),
            id_card: Masked(id_card),
            gender: self.gender,
            birthday: self.birthday,
            nationality: self.nationality.as_ref().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            contact_phone,
        })
    }

    pub fn into_passenger(self) -> Passenger {
        Passenger {
            id: PassengerId::new(),
            name: self.name,
            id_card: self.id_card,
            gender: self.gender,
            birthday: self.birthday,
            nationality: self.nationality,
            contact_phone: self.contact_phone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassengerError {
    #[error("Passenger name is required")]
    MissingName,

    #[error("Passenger name is {0} characters long")]
    NameTooLong(usize),

    #[error("Malformed ID card number {0}")]
    MalformedIdCard(Masked<String>),

    #[error("Malformed contact phone {0}")]
    MalformedPhone(Masked<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_identity() {
        let info = PassengerInfo::new("  Li Lei ", "11010519491231002x");
        let normalized = info.normalized().unwrap();
        assert_eq!(normalized.name, "Li Lei");
        assert_eq!(normalized.id_card.expose(), "11010519491231002X");
    }

    #[test]
    fn test_rejects_malformed_identity() {
        assert_eq!(
            PassengerInfo::new(" ", "110105194912310021").normalized().unwrap_err(),
            PassengerError::MissingName
        );
        assert!(matches!(
            PassengerInfo::new("Han Meimei", "1101-05").normalized(),
            Err(PassengerError::MalformedIdCard(_))
        ));
        assert!(PassengerInfo::new("Han Meimei", "12345").normalized().is_err());

        let mut info = PassengerInfo::new("Han Meimei", "E12345678");
        info.contact_phone = Some(Masked("call me".to_string()));
        assert!(matches!(info.normalized(), Err(PassengerError::MalformedPhone(_))));
    }

    #[test]
    fn test_error_message_masks_id() {
        let err = PassengerInfo::new("Han Meimei", "ABC-123456").normalized().unwrap_err();
        assert!(!err.to_string().contains("ABC"));
    }
}
