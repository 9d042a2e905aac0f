//! Field-level password item encryption
//!
//! Each sensitive field is sealed under its own key
//! (`HKDF(item-password-{id}) → field-{label}`), with associated data
//! `context || 0 || itemId || 0 || label` so ciphertexts cannot be moved
//! between fields or items. Name, URL, timestamps and tags stay in clear.

use std::collections::BTreeMap;

use tracing::debug;
use zeroize::Zeroize;
use zkv_core::types::{
    now_millis, EncryptedFields, EncryptedPasswordItem, EncryptionResult, ItemMetadata,
    PasswordItem, PasswordItemPatch,
};
use zkv_core::{CryptoError, CryptoResult, ErrorCode, AEAD_ALGORITHM, FORMAT_VERSION};

use crate::cipher;
use crate::keys::{derive_field_key, derive_item_key, AccountKey, FieldName, ItemKey, ItemKind};
use crate::{NONCE_SIZE, TAG_SIZE};

fn field_aad(context: &[u8], item_id: &str, field: &FieldName<'_>) -> Vec<u8> {
    let label = field.label();
    let mut aad = Vec::with_capacity(context.len() + item_id.len() + label.len() + 2);
    aad.extend_from_slice(context);
    aad.push(0);
    aad.extend_from_slice(item_id.as_bytes());
    aad.push(0);
    aad.extend_from_slice(label.as_bytes());
    aad
}

fn seal_field(
    item_key: &ItemKey,
    item_id: &str,
    field: FieldName<'_>,
    value: &str,
    context: &[u8],
) -> CryptoResult<EncryptionResult> {
    let key = derive_field_key(item_key, &field)?;
    cipher::encrypt(value.as_bytes(), key.as_bytes(), &field_aad(context, item_id, &field))
}

fn open_field(
    item_key: &ItemKey,
    item_id: &str,
    field: FieldName<'_>,
    sealed: &EncryptionResult,
    context: &[u8],
) -> CryptoResult<String> {
    let key = derive_field_key(item_key, &field)?;
    let bytes = cipher::decrypt(sealed, key.as_bytes(), &field_aad(context, item_id, &field))?;
    String::from_utf8(bytes).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        CryptoError::new(
            ErrorCode::DecryptionFailed,
            format!("field {} is not valid UTF-8", field.label()),
        )
    })
}

pub fn encrypt_password_item(
    item: &PasswordItem,
    account_key: &AccountKey,
    context: &[u8],
) -> CryptoResult<EncryptedPasswordItem> {
    validate_password_item(item)?;
    let item_key = derive_item_key(account_key, &item.id, ItemKind::Password)?;
    let id = item.id.as_str();

    let username = seal_field(&item_key, id, FieldName::Username, &item.username, context)?;
    let password = seal_field(&item_key, id, FieldName::Password, &item.password, context)?;
    let notes = item
        .notes
        .as_deref()
        .map(|n| seal_field(&item_key, id, FieldName::Notes, n, context))
        .transpose()?;
    let custom_fields = item
        .custom_fields
        .as_ref()
        .map(|fields| {
            fields
                .iter()
                .map(|(name, value)| {
                    seal_field(&item_key, id, FieldName::Custom(name), value, context)
                        .map(|sealed| (name.clone(), sealed))
                })
                .collect::<CryptoResult<BTreeMap<_, _>>>()
        })
        .transpose()?;

    debug!(
        item_id = id,
        custom_fields = custom_fields.as_ref().map_or(0, BTreeMap::len),
        "password item encrypted"
    );

    Ok(EncryptedPasswordItem {
        metadata: ItemMetadata {
            id: item.id.clone(),
            name: item.name.clone(),
            url: item.url.clone(),
            created_at: item.created_at,
            modified_at: item.modified_at,
            tags: item.tags.clone(),
        },
        encrypted_fields: EncryptedFields {
            username,
            password,
            notes,
            custom_fields,
        },
        version: FORMAT_VERSION,
    })
}

pub fn decrypt_password_item(
    encrypted: &EncryptedPasswordItem,
    account_key: &AccountKey,
    context: &[u8],
) -> CryptoResult<PasswordItem> {
    validate_encrypted_password_item(encrypted)?;
    let meta = &encrypted.metadata;
    let fields = &encrypted.encrypted_fields;
    let item_key = derive_item_key(account_key, &meta.id, ItemKind::Password)?;

    let mut item = PasswordItem {
        id: meta.id.clone(),
        name: meta.name.clone(),
        url: meta.url.clone(),
        username: String::new(),
        password: String::new(),
        notes: None,
        custom_fields: None,
        created_at: meta.created_at,
        modified_at: meta.modified_at,
        tags: meta.tags.clone(),
    };

    // Partially decrypted items are wiped before an error propagates
    match open_fields(&mut item, &item_key, fields, context) {
        Ok(()) => Ok(item),
        Err(e) => {
            wipe(&mut item);
            Err(e)
        }
    }
}

fn open_fields(
    item: &mut PasswordItem,
    item_key: &ItemKey,
    fields: &EncryptedFields,
    context: &[u8],
) -> CryptoResult<()> {
    let id = item.id.clone();
    item.username = open_field(item_key, &id, FieldName::Username, &fields.username, context)?;
    item.password = open_field(item_key, &id, FieldName::Password, &fields.password, context)?;
    if let Some(notes) = &fields.notes {
        item.notes = Some(open_field(item_key, &id, FieldName::Notes, notes, context)?);
    }
    if let Some(custom) = &fields.custom_fields {
        let mut opened = BTreeMap::new();
        for (name, sealed) in custom {
            match open_field(item_key, &id, FieldName::Custom(name), sealed, context) {
                Ok(value) => {
                    opened.insert(name.clone(), value);
                }
                Err(e) => {
                    wipe_map(&mut opened);
                    return Err(e);
                }
            }
        }
        item.custom_fields = Some(opened);
    }
    Ok(())
}

/// Decrypt, apply `patch`, bump `modified_at`, and re-encrypt every field
/// with fresh nonces. The input ciphertext is never edited.
pub fn update_password_item(
    encrypted: &EncryptedPasswordItem,
    patch: &PasswordItemPatch,
    account_key: &AccountKey,
    context: &[u8],
) -> CryptoResult<EncryptedPasswordItem> {
    let mut item = decrypt_password_item(encrypted, account_key, context)?;
    apply_patch(&mut item, patch);
    item.modified_at = now_millis().max(encrypted.metadata.modified_at.saturating_add(1));

    let result = encrypt_password_item(&item, account_key, context);
    wipe(&mut item);
    result
}

fn apply_patch(item: &mut PasswordItem, patch: &PasswordItemPatch) {
    if let Some(name) = &patch.name {
        item.name = name.clone();
    }
    if let Some(url) = &patch.url {
        item.url = url.clone();
    }
    if let Some(username) = &patch.username {
        item.username.zeroize();
        item.username = username.clone();
    }
    if let Some(password) = &patch.password {
        item.password.zeroize();
        item.password = password.clone();
    }
    if let Some(notes) = &patch.notes {
        if let Some(old) = item.notes.as_mut() {
            old.zeroize();
        }
        item.notes = notes.clone();
    }
    if let Some(tags) = &patch.tags {
        item.tags = tags.clone();
    }

    if !patch.set_custom_fields.is_empty() || !patch.remove_custom_fields.is_empty() {
        let mut custom = item.custom_fields.take().unwrap_or_default();
        for name in &patch.remove_custom_fields {
            if let Some(mut old) = custom.remove(name) {
                old.zeroize();
            }
        }
        for (name, value) in &patch.set_custom_fields {
            if let Some(mut old) = custom.insert(name.clone(), value.clone()) {
                old.zeroize();
            }
        }
        item.custom_fields = (!custom.is_empty()).then_some(custom);
    }
}

fn wipe_map(map: &mut BTreeMap<String, String>) {
    for value in map.values_mut() {
        value.zeroize();
    }
}

fn wipe(item: &mut PasswordItem) {
    item.username.zeroize();
    item.password.zeroize();
    if let Some(notes) = item.notes.as_mut() {
        notes.zeroize();
    }
    if let Some(custom) = item.custom_fields.as_mut() {
        wipe_map(custom);
    }
}

/// Structural checks run before encryption. Not a security control.
pub fn validate_password_item(item: &PasswordItem) -> CryptoResult<()> {
    let invalid = |msg: &str| Err(CryptoError::new(ErrorCode::InvalidItem, msg));

    for (field, value) in [
        ("id", &item.id),
        ("name", &item.name),
        ("username", &item.username),
        ("password", &item.password),
    ] {
        if value.trim().is_empty() {
            return invalid(&format!("{field} must not be empty"));
        }
    }
    if item.modified_at < item.created_at {
        return invalid("modifiedAt precedes createdAt");
    }
    if let Some(custom) = &item.custom_fields {
        if custom.keys().any(|k| k.is_empty()) {
            return invalid("custom field names must not be empty");
        }
    }
    Ok(())
}

/// Structural checks run before decryption.
pub fn validate_encrypted_password_item(item: &EncryptedPasswordItem) -> CryptoResult<()> {
    if item.version == 0 || item.version > FORMAT_VERSION {
        return Err(CryptoError::new(
            ErrorCode::UnsupportedVersion,
            format!("item version {} not supported (max {FORMAT_VERSION})", item.version),
        ));
    }

    let invalid = |msg: String| Err(CryptoError::new(ErrorCode::InvalidEncryptedItem, msg));
    if item.metadata.id.trim().is_empty() {
        return invalid("metadata.id must not be empty".into());
    }
    if item.metadata.name.trim().is_empty() {
        return invalid("metadata.name must not be empty".into());
    }

    let fields = &item.encrypted_fields;
    let mut sealed: Vec<(String, &EncryptionResult)> = vec![
        ("username".into(), &fields.username),
        ("password".into(), &fields.password),
    ];
    if let Some(notes) = &fields.notes {
        sealed.push(("notes".into(), notes));
    }
    if let Some(custom) = &fields.custom_fields {
        for (name, value) in custom {
            if name.is_empty() {
                return invalid("custom field names must not be empty".into());
            }
            sealed.push((format!("customFields.{name}"), value));
        }
    }

    for (name, result) in sealed {
        if result.algorithm != AEAD_ALGORITHM
            || result.nonce.len() != NONCE_SIZE
            || result.auth_tag.len() != TAG_SIZE
        {
            return invalid(format!("{name} is not a well-formed {AEAD_ALGORITHM} result"));
        }
    }
    Ok(())
}
