//! Minimal form rules for the sign-in and password recovery flows.

use miniteacher_core::{DomainError, DomainResult};

pub const MIN_PASSWORD_LEN: usize = 6;

fn validate_email(email: &str) -> DomainResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::validation("email is required"));
    }
    if !email.contains('@') {
        return Err(DomainError::validation("email is not valid"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SignInForm<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

impl SignInForm<'_> {
    pub fn validate(&self) -> DomainResult<()> {
        validate_email(self.email)?;
        if self.password.is_empty() {
            return Err(DomainError::validation("password is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

impl PasswordResetRequest<'_> {
    pub fn validate(&self) -> DomainResult<()> {
        validate_email(self.email)
    }
}

#[derive(Debug, Clone)]
pub struct NewPassword<'a> {
    pub password: &'a str,
    pub confirmation: &'a str,
}

impl NewPassword<'_> {
    pub fn validate(&self) -> DomainResult<()> {
        if self.password != self.confirmation {
            return Err(DomainError::validation("passwords do not match"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// The reset-password view is only reachable from a recovery email link.
pub fn is_recovery_link(fragment: &str) -> bool {
    fragment
        .trim_start_matches('#')
        .split('&')
        .any(|pair| pair == "type=recovery")
}
