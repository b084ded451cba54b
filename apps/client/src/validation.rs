//! Client-side checks that run before any request is issued.

use crate::error::{ClientError, FieldError};
use crate::models::{ImageUpload, NewPost, Registration};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=30;
pub const MAX_POST_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

fn finish(errors: Vec<FieldError>) -> Result<(), ClientError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::validation(errors))
    }
}

/// Comment and chat message bodies.
pub fn text_body(field: &str, text: &str) -> Result<(), ClientError> {
    if text.trim().is_empty() {
        return Err(ClientError::field(field, "Text cannot be empty"));
    }
    Ok(())
}

pub fn login(email: &str, password: &str) -> Result<(), ClientError> {
    let mut errors = Vec::new();
    if email.trim().is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    }
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    finish(errors)
}

pub fn registration(form: &Registration) -> Result<(), ClientError> {
    let mut errors = Vec::new();
    if form.email.trim().is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    }
    if form.password != form.confirm_password {
        errors.push(FieldError::new("confirm_password", "Passwords do not match"));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if !USERNAME_LEN.contains(&form.username.chars().count()) {
        errors.push(FieldError::new(
            "username",
            format!(
                "Username must be between {} and {} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            ),
        ));
    }
    finish(errors)
}

fn image_errors(field: &str, image: &ImageUpload, errors: &mut Vec<FieldError>) {
    if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
        errors.push(FieldError::new(
            field,
            format!("{}: only JPG, PNG or GIF images are allowed", image.file_name),
        ));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        errors.push(FieldError::new(
            field,
            format!("{}: images must be 5MB or smaller", image.file_name),
        ));
    }
}

pub fn new_post(post: &NewPost) -> Result<(), ClientError> {
    let mut errors = Vec::new();
    if post.caption.trim().is_empty() && post.images.is_empty() {
        errors.push(FieldError::new("caption", "Add a caption or at least one image"));
    }
    if post.images.len() > MAX_POST_IMAGES {
        errors.push(FieldError::new(
            "images",
            format!("You cannot upload more than {MAX_POST_IMAGES} images"),
        ));
    }
    for image in &post.images {
        image_errors("images", image, &mut errors);
    }
    finish(errors)
}

pub fn avatar(image: &ImageUpload) -> Result<(), ClientError> {
    let mut errors = Vec::new();
    image_errors("avatar", image, &mut errors);
    finish(errors)
}
