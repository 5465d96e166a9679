//! ストアエラーの分類ユーティリティ。ログの `transient` フィールドに使う。
use anyhow::Error;
use sqlx::Error as SqlxError;

/// エラーの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 一時的なエラー（プール枯渇、接続断、タイムアウトなど）。次のサイクルで回復し得る。
    Transient,
    /// それ以外（クエリ不整合、デコード失敗、設定エラーなど）
    Permanent,
}

/// エラーチェーンを辿って最初の `sqlx::Error` で分類する。
#[must_use]
pub fn classify_error(error: &Error) -> ErrorKind {
    let Some(sqlx_err) = error.chain().find_map(|cause| cause.downcast_ref::<SqlxError>()) else {
        return ErrorKind::Permanent;
    };

    match sqlx_err {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => ErrorKind::Transient,
        // 40001 serialization_failure, 40P01 deadlock_detected, 57P01 admin_shutdown
        SqlxError::Database(db_err) => match db_err.code().as_deref() {
            Some("40001" | "40P01" | "57P01") => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        },
        _ => ErrorKind::Permanent,
    }
}

#[must_use]
pub fn is_transient(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Transient)
}
