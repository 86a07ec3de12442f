use super::device::{Attribute, DeviceReport};
use crate::utils::RegistryError;

pub fn validate_report(report: &DeviceReport) -> Result<(), RegistryError> {
    if report.id.is_empty() {
        return Err(invalid("empty id"));
    }
    if report.kind.is_empty() {
        return Err(invalid("empty type"));
    }
    if report.reference.is_empty() {
        return Err(invalid("empty reference"));
    }
    validate_attributes(&report.attributes)
}

pub fn validate_attributes(attributes: &[Attribute]) -> Result<(), RegistryError> {
    if attributes.iter().any(|attr| attr.key.is_empty()) {
        return Err(invalid("empty attribute key"));
    }
    Ok(())
}

fn invalid(reason: &str) -> RegistryError {
    RegistryError::InvalidInput(reason.to_string())
}
