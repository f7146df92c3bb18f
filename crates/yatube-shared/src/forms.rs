//! Form validation for user-submitted payloads.
//!
//! Validators never persist anything. They turn raw field values into a
//! cleaned, typed bundle (or per-field errors) and leave it to the caller to
//! stamp derived fields such as the author before saving.

use serde::Deserialize;

use crate::constants::{GROUP_TITLE_MAX_LEN, PASSWORD_MIN_LEN, USERNAME_MAX_LEN};
use crate::error::{FormErrors, ImageError};
use crate::upload::{inspect_image, ImageInfo};

// ---------------------------------------------------------------------------
// Field metadata
// ---------------------------------------------------------------------------

/// Presentation metadata of one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub placeholder: Option<&'static str>,
}

pub const POST_TEXT: FieldMeta = FieldMeta {
    name: "text",
    label: "Пост:",
    help_text: "Напишите пост и нажмите \"Добавить\"",
    placeholder: Some("Введите какой-нибудь текст, ну пожалуйста 😥"),
};

pub const POST_GROUP: FieldMeta = FieldMeta {
    name: "group",
    label: "Группа",
    help_text: "Выбирать группу не обязательно",
    placeholder: None,
};

pub const POST_IMAGE: FieldMeta = FieldMeta {
    name: "image",
    label: "Изображение",
    help_text: "Вы можете добавить изображение. Оно будет обрезано до формата 960x339 px.",
    placeholder: None,
};

pub const COMMENT_TEXT: FieldMeta = FieldMeta {
    name: "text",
    label: "Комментарий:",
    help_text: "Напишите комментарий и нажмите \"Добавить\"",
    placeholder: Some("Ваш комментарий"),
};

/// Label of the "no group" choice in the group select.
pub const GROUP_EMPTY_LABEL: &str = "Нажмите сюда, чтобы выбрать группу";

/// Checkbox that removes the current image when editing a post.
pub const IMAGE_CLEAR_FIELD: &str = "image-clear";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub const MSG_REQUIRED: &str = "Обязательное поле.";
pub const MSG_INVALID_CHOICE: &str =
    "Выберите корректный вариант. Вашего варианта нет среди допустимых значений.";
pub const MSG_INVALID_IMAGE: &str =
    "Загрузите правильное изображение. Файл, который вы загрузили, поврежден или не является изображением.";
pub const MSG_EMPTY_FILE: &str = "Отправленный файл пуст.";
pub const MSG_FILE_TOO_LARGE: &str = "Файл слишком большой.";
pub const MSG_INVALID_USERNAME: &str =
    "Введите правильное имя пользователя. Оно может содержать только буквы, цифры и знаки @/./+/-/_.";
pub const MSG_USERNAME_TAKEN: &str = "Пользователь с таким именем уже существует.";
pub const MSG_PASSWORD_TOO_SHORT: &str = "Введённый пароль слишком короткий.";
pub const MSG_PASSWORD_MISMATCH: &str = "Введённые пароли не совпадают.";
pub const MSG_BAD_CREDENTIALS: &str =
    "Пожалуйста, введите правильные имя пользователя и пароль.";
pub const MSG_INVALID_SLUG: &str =
    "Значение должно состоять только из латинских букв, цифр, знаков подчеркивания или дефиса.";
pub const MSG_TOO_LONG: &str = "Слишком длинное значение.";

// ---------------------------------------------------------------------------
// Raw inputs
// ---------------------------------------------------------------------------

/// A file taken from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Raw post form submission. `group` is the select value, empty for "no group".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostInput {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedFile>,
    pub clear_image: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupInput {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Cleaned outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedImage {
    pub file_name: String,
    pub data: Vec<u8>,
    pub info: ImageInfo,
}

/// What to do with a post's image when saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(CleanedImage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedComment {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedSignup {
    pub username: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Validator for creating and editing posts.
///
/// `groups` holds the ids the group select offers; anything else is an
/// invalid choice.
#[derive(Debug, Clone)]
pub struct PostForm<'a> {
    groups: &'a [i64],
    max_upload_size: usize,
}

impl<'a> PostForm<'a> {
    pub fn new(groups: &'a [i64], max_upload_size: usize) -> Self {
        Self {
            groups,
            max_upload_size,
        }
    }

    pub fn validate(&self, input: &PostInput) -> Result<CleanedPost, FormErrors> {
        let mut errors = FormErrors::new();

        let text = required_text(&mut errors, POST_TEXT.name, &input.text);

        let group = input.group.trim();
        let group_id = if group.is_empty() {
            None
        } else {
            match group.parse::<i64>() {
                Ok(id) if self.groups.contains(&id) => Some(id),
                _ => {
                    errors.add(POST_GROUP.name, MSG_INVALID_CHOICE);
                    None
                }
            }
        };

        let image = match &input.image {
            Some(file) => match inspect_image(&file.data, self.max_upload_size) {
                Ok(info) => ImageChange::Replace(CleanedImage {
                    file_name: file.file_name.clone(),
                    data: file.data.clone(),
                    info,
                }),
                Err(e) => {
                    errors.add(POST_IMAGE.name, image_message(&e));
                    ImageChange::Keep
                }
            },
            None if input.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        errors.into_result(CleanedPost {
            text,
            group_id,
            image,
        })
    }
}

pub struct CommentForm;

impl CommentForm {
    pub fn validate(input: &CommentInput) -> Result<CleanedComment, FormErrors> {
        let mut errors = FormErrors::new();
        let text = required_text(&mut errors, COMMENT_TEXT.name, &input.text);
        errors.into_result(CleanedComment { text })
    }
}

pub struct SignupForm;

impl SignupForm {
    /// Checks field shape only; username uniqueness is the store's call.
    pub fn validate(input: &SignupInput) -> Result<CleanedSignup, FormErrors> {
        let mut errors = FormErrors::new();

        let username = required_text(&mut errors, "username", &input.username);
        if !username.is_empty() {
            if username.chars().count() > USERNAME_MAX_LEN {
                errors.add("username", MSG_TOO_LONG);
            } else if !is_valid_username(&username) {
                errors.add("username", MSG_INVALID_USERNAME);
            }
        }

        if input.password1.is_empty() {
            errors.add("password1", MSG_REQUIRED);
        } else if input.password1.chars().count() < PASSWORD_MIN_LEN {
            errors.add("password1", MSG_PASSWORD_TOO_SHORT);
        }
        if input.password2.is_empty() {
            errors.add("password2", MSG_REQUIRED);
        } else if input.password1 != input.password2 {
            errors.add("password2", MSG_PASSWORD_MISMATCH);
        }

        errors.into_result(CleanedSignup {
            username,
            password: input.password1.clone(),
        })
    }
}

pub struct GroupForm;

impl GroupForm {
    pub fn validate(input: &GroupInput) -> Result<GroupInput, FormErrors> {
        let mut errors = FormErrors::new();

        let title = required_text(&mut errors, "title", &input.title);
        if title.chars().count() > GROUP_TITLE_MAX_LEN {
            errors.add("title", MSG_TOO_LONG);
        }

        let slug = required_text(&mut errors, "slug", &input.slug);
        if !slug.is_empty() && !is_valid_slug(&slug) {
            errors.add("slug", MSG_INVALID_SLUG);
        }

        let description = required_text(&mut errors, "description", &input.description);

        errors.into_result(GroupInput {
            title,
            slug,
            description,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required_text(errors: &mut FormErrors, field: &'static str, raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, MSG_REQUIRED);
    }
    value.to_string()
}

fn image_message(err: &ImageError) -> &'static str {
    match err {
        ImageError::Empty => MSG_EMPTY_FILE,
        ImageError::TooLarge { .. } => MSG_FILE_TOO_LARGE,
        ImageError::UnsupportedFormat | ImageError::Decode(_) => MSG_INVALID_IMAGE,
    }
}

/// Letters, digits and `@ . + - _`.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
