use validator::Validate;

use crate::{
    authentication::cryptography::hash_password,
    error::{ApiError, FieldErrors},
    schema::User,
    store::StoreTx,
};

const BLANK: &str = "This field may not be blank.";
const DUPLICATE_EMAIL: &str = "user with this email already exists.";

#[derive(Debug, Validate)]
struct NewUser {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    email: String,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    name: String,
}

impl NewUser {
    fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let Err(invalid) = self.validate() else {
            return errors;
        };

        for (field, failures) in invalid.field_errors() {
            errors.entry(field.to_string()).or_default().extend(
                failures.iter().map(|failure| {
                    failure
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| failure.code.to_string())
                }),
            );
        }

        errors
    }
}

/// Lower-cases the domain part, leaving the local part as given.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();

    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub async fn get_user<T: StoreTx>(tx: &mut T, id: i32) -> Result<Option<User>, ApiError> {
    tx.find_user(id).await
}

/// Creates a user with their password stored as an argon2 hash.
pub async fn create_user<T: StoreTx>(
    tx: &mut T,
    email: &str,
    name: &str,
    password: &str,
) -> Result<User, ApiError> {
    let input = NewUser {
        email: normalize_email(email),
        name: name.trim().to_string(),
    };

    let mut errors = input.field_errors();
    if input.email.is_empty() {
        errors.insert("email".into(), vec![BLANK.into()]);
    }
    if password.is_empty() {
        errors.entry("password".into()).or_default().push(BLANK.into());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let hash = hash_password(password)?;
    let user = tx
        .insert_user(&input.email, &input.name, &hash)
        .await?
        .ok_or_else(|| ApiError::validation("email", DUPLICATE_EMAIL))?;

    log::info!("Created user {} ({})", user.id, user.email);
    Ok(user)
}
