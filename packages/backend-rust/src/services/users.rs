use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::services::coins::{self, CoinTransaction};
use crate::services::encryption::{mask_aadhaar, mask_email, mask_phone, FieldCipher};
use crate::services::otp::OtpKind;
use crate::services::validation::{self, Validator};
use crate::services::{assessment, now_iso, ServiceError};

pub const TOTAL_REGISTRATION_STEPS: i64 = 9;

pub const ROLES: &[&str] = &["student", "teacher", "alumni", "college_administrator"];
pub const ACCOUNT_STATUSES: &[&str] = &["active", "inactive", "suspended", "pending_verification"];

const STEP_NAMES: [&str; 9] = [
    "Basic Information",
    "OTP Verification",
    "Aadhaar Verification",
    "Personal Details",
    "Academic Records",
    "Family Information",
    "Document Upload",
    "Review",
    "Submission",
];

const GENDERS: &[&str] = &["male", "female", "other"];
const STREAMS: &[&str] = &["science", "commerce", "arts", "vocational"];

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub account_status: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub aadhaar_masked: Option<String>,
    pub aadhaar_verified: bool,

    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,

    pub class_10_board: Option<String>,
    pub class_10_year: Option<i64>,
    pub class_10_percentage: Option<f64>,
    pub class_12_board: Option<String>,
    pub class_12_year: Option<i64>,
    pub class_12_percentage: Option<f64>,
    pub class_12_stream: Option<String>,

    pub father_name: Option<String>,
    pub father_occupation: Option<String>,
    pub father_phone: Option<String>,
    pub mother_name: Option<String>,
    pub mother_occupation: Option<String>,
    pub mother_phone: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_relation: Option<String>,
    pub guardian_phone: Option<String>,

    pub documents_acknowledged: bool,
    pub registration_step: i64,
    pub registration_completed: bool,
    pub registration_completed_at: Option<String>,
    pub assessment_completed: bool,
    pub assessment_completed_at: Option<String>,

    pub total_coins: i64,
    pub current_streak: i64,
    pub puzzles_solved: i64,
    pub forum_posts: i64,
    pub reputation_score: i64,

    pub college_name: Option<String>,
    pub course_name: Option<String>,
    pub admission_year: Option<i64>,

    pub profile_visible: bool,
    pub email_visible: bool,
    pub phone_visible: bool,

    pub last_login: Option<String>,
    #[serde(skip_serializing)]
    pub login_attempts: i64,
    #[serde(skip_serializing)]
    pub account_locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields safe to hand back from auth endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub account_status: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub registration_step: i64,
    pub registration_completed: bool,
    pub assessment_completed: bool,
    pub total_coins: i64,
    pub college_name: Option<String>,
    pub course_name: Option<String>,
    pub admission_year: Option<i64>,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            role: self.role.clone(),
            account_status: self.account_status.clone(),
            email_verified: self.email_verified,
            phone_verified: self.phone_verified,
            registration_step: self.registration_step,
            registration_completed: self.registration_completed,
            assessment_completed: self.assessment_completed,
            total_coins: self.total_coins,
            college_name: self.college_name.clone(),
            course_name: self.course_name.clone(),
            admission_year: self.admission_year,
            last_login: self.last_login.clone(),
            created_at: self.created_at.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "college_administrator"
    }
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        role: row.try_get("role")?,
        account_status: row.try_get("account_status")?,
        email_verified: row.try_get("email_verified")?,
        phone_verified: row.try_get("phone_verified")?,
        aadhaar_masked: row.try_get("aadhaar_masked")?,
        aadhaar_verified: row.try_get("aadhaar_verified")?,
        date_of_birth: row.try_get("date_of_birth")?,
        gender: row.try_get("gender")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        pincode: row.try_get("pincode")?,
        class_10_board: row.try_get("class_10_board")?,
        class_10_year: row.try_get("class_10_year")?,
        class_10_percentage: row.try_get("class_10_percentage")?,
        class_12_board: row.try_get("class_12_board")?,
        class_12_year: row.try_get("class_12_year")?,
        class_12_percentage: row.try_get("class_12_percentage")?,
        class_12_stream: row.try_get("class_12_stream")?,
        father_name: row.try_get("father_name")?,
        father_occupation: row.try_get("father_occupation")?,
        father_phone: row.try_get("father_phone")?,
        mother_name: row.try_get("mother_name")?,
        mother_occupation: row.try_get("mother_occupation")?,
        mother_phone: row.try_get("mother_phone")?,
        guardian_name: row.try_get("guardian_name")?,
        guardian_relation: row.try_get("guardian_relation")?,
        guardian_phone: row.try_get("guardian_phone")?,
        documents_acknowledged: row.try_get("documents_acknowledged")?,
        registration_step: row.try_get("registration_step")?,
        registration_completed: row.try_get("registration_completed")?,
        registration_completed_at: row.try_get("registration_completed_at")?,
        assessment_completed: row.try_get("assessment_completed")?,
        assessment_completed_at: row.try_get("assessment_completed_at")?,
        total_coins: row.try_get("total_coins")?,
        current_streak: row.try_get("current_streak")?,
        puzzles_solved: row.try_get("puzzles_solved")?,
        forum_posts: row.try_get("forum_posts")?,
        reputation_score: row.try_get("reputation_score")?,
        college_name: row.try_get("college_name")?,
        course_name: row.try_get("course_name")?,
        admission_year: row.try_get("admission_year")?,
        profile_visible: row.try_get("profile_visible")?,
        email_visible: row.try_get("email_visible")?,
        phone_visible: row.try_get("phone_visible")?,
        last_login: row.try_get("last_login")?,
        login_attempts: row.try_get("login_attempts")?,
        account_locked_until: row.try_get("account_locked_until")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn find_by_id(pool: &SqlitePool, user_id: &str) -> Result<Option<User>, ServiceError> {
    let row = sqlx::query(r#"SELECT * FROM "users" WHERE "id" = ?"#)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(map_user_row).transpose()?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, ServiceError> {
    let row = sqlx::query(r#"SELECT * FROM "users" WHERE "email" = ?"#)
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(map_user_row).transpose()?)
}

pub async fn get(pool: &SqlitePool, user_id: &str) -> Result<User, ServiceError> {
    find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

// ---------------------------------------------------------------------------
// Account creation and login bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub role: &'a str,
}

/// Inserts the account and credits the registration reward in one transaction.
pub async fn create(
    pool: &SqlitePool,
    new_user: NewUser<'_>,
    registration_reward: i64,
) -> Result<User, ServiceError> {
    let email = new_user.email.trim().to_lowercase();
    let exists: Option<String> = sqlx::query_scalar(r#"SELECT "id" FROM "users" WHERE "email" = ?"#)
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(ServiceError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_iso();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO "users"
          ("id", "email", "password_hash", "name", "phone", "role", "account_status",
           "registration_step", "created_at", "updated_at")
        VALUES (?, ?, ?, ?, ?, ?, 'pending_verification', 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(new_user.password_hash)
    .bind(new_user.name.trim())
    .bind(new_user.phone)
    .bind(new_user.role)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    if registration_reward > 0 {
        coins::apply(
            &mut tx,
            coins::CoinEntry {
                user_id: &id,
                kind: coins::TransactionType::Earned,
                source: coins::CoinSource::Registration,
                amount: registration_reward,
                reason: "Registration bonus",
                reference_id: None,
            },
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(user_id = %id, role = new_user.role, "user registered");
    get(pool, &id).await
}

pub const MAX_LOGIN_ATTEMPTS: i64 = 5;
pub const LOCK_MINUTES: i64 = 30;

/// Counts a failed login; the fifth consecutive failure locks the account.
pub async fn record_login_failure(pool: &SqlitePool, user: &User) -> Result<bool, ServiceError> {
    let attempts = user.login_attempts + 1;
    let locked_until = (attempts >= MAX_LOGIN_ATTEMPTS)
        .then(|| crate::services::iso_from(Utc::now() + chrono::Duration::minutes(LOCK_MINUTES)));

    sqlx::query(
        r#"
        UPDATE "users"
        SET "login_attempts" = ?, "account_locked_until" = COALESCE(?, "account_locked_until"), "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(if locked_until.is_some() { 0 } else { attempts })
    .bind(&locked_until)
    .bind(now_iso())
    .bind(&user.id)
    .execute(pool)
    .await?;

    if locked_until.is_some() {
        tracing::warn!(user_id = %user.id, "account locked after repeated login failures");
    }
    Ok(locked_until.is_some())
}

pub async fn record_login_success(pool: &SqlitePool, user_id: &str) -> Result<(), ServiceError> {
    let now = now_iso();
    sqlx::query(
        r#"
        UPDATE "users"
        SET "login_attempts" = 0, "account_locked_until" = NULL, "last_login" = ?, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub fn is_locked(user: &User) -> bool {
    user.account_locked_until
        .as_deref()
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .is_some_and(|until| until.with_timezone(&Utc) > Utc::now())
}

pub async fn set_password_hash(
    pool: &SqlitePool,
    user_id: &str,
    password_hash: &str,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        UPDATE "users"
        SET "password_hash" = ?, "password_reset_token" = NULL, "password_reset_expires" = NULL,
            "login_attempts" = 0, "account_locked_until" = NULL, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(password_hash)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn store_reset_token(
    pool: &SqlitePool,
    user_id: &str,
    token_hash: &str,
    expires_at: &str,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        UPDATE "users"
        SET "password_reset_token" = ?, "password_reset_expires" = ?, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(token_hash)
    .bind(expires_at)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Looks up the user holding an unexpired reset token.
pub async fn find_by_reset_token(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<User>, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "users"
        WHERE "password_reset_token" = ? AND "password_reset_expires" > ?
        "#,
    )
    .bind(token_hash)
    .bind(now_iso())
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_user_row).transpose()?)
}

/// Marks the matching account verified for the OTP channel. Returns whether a user matched.
pub async fn mark_verified(
    pool: &SqlitePool,
    kind: OtpKind,
    identifier: &str,
) -> Result<bool, ServiceError> {
    let sql = match kind {
        OtpKind::Email => {
            r#"UPDATE "users" SET "email_verified" = 1, "updated_at" = ? WHERE "email" = ?"#
        }
        OtpKind::Phone => {
            r#"UPDATE "users" SET "phone_verified" = 1, "updated_at" = ? WHERE "phone" = ?"#
        }
    };
    let identifier = match kind {
        OtpKind::Email => identifier.trim().to_lowercase(),
        OtpKind::Phone => identifier.trim().to_string(),
    };
    let result = sqlx::query(sql)
        .bind(now_iso())
        .bind(identifier)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Deactivates the account and frees its email address.
pub async fn soft_delete(pool: &SqlitePool, user_id: &str) -> Result<(), ServiceError> {
    let anonymised = format!("deleted_{user_id}@careernavigator.invalid");
    let result = sqlx::query(
        r#"
        UPDATE "users"
        SET "account_status" = 'inactive', "email" = ?, "phone" = NULL, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(anonymised)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("User not found"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Registration wizard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StepDetail {
    pub step: i64,
    pub name: &'static str,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub current_step: i64,
    pub completed: bool,
    pub steps_completed: i64,
    pub total_steps: i64,
    pub step_details: Vec<StepDetail>,
}

pub fn registration_status(user: &User) -> RegistrationStatus {
    let done = [
        user.registration_step > 1,
        user.phone_verified && user.email_verified,
        user.aadhaar_verified,
        user.date_of_birth.is_some(),
        user.class_12_percentage.is_some(),
        user.father_name.is_some(),
        user.documents_acknowledged,
        user.registration_step > 8,
        user.registration_completed,
    ];

    RegistrationStatus {
        current_step: user.registration_step,
        completed: user.registration_completed,
        steps_completed: (user.registration_step - 1).max(0),
        total_steps: TOTAL_REGISTRATION_STEPS,
        step_details: STEP_NAMES
            .iter()
            .zip(done)
            .enumerate()
            .map(|(idx, (name, completed))| StepDetail {
                step: idx as i64 + 1,
                name,
                completed,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AadhaarPayload {
    pub aadhaar_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalDetails {
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademicInfo {
    pub class_10_board: Option<String>,
    pub class_10_year: Option<i64>,
    pub class_10_percentage: Option<f64>,
    pub class_12_board: Option<String>,
    pub class_12_year: Option<i64>,
    pub class_12_percentage: Option<f64>,
    pub class_12_stream: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FamilyInfo {
    pub father_name: Option<String>,
    pub father_occupation: Option<String>,
    pub father_phone: Option<String>,
    pub mother_name: Option<String>,
    pub mother_occupation: Option<String>,
    pub mother_phone: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_relation: Option<String>,
    pub guardian_phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentsPayload {
    #[serde(default)]
    pub documents_acknowledged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: i64,
    pub current_step: i64,
    pub registration_completed: bool,
}

fn parse_payload<T: serde::de::DeserializeOwned + Default>(
    payload: serde_json::Value,
) -> Result<T, ServiceError> {
    if payload.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(payload)
        .map_err(|err| ServiceError::validation(format!("Invalid step data: {err}")))
}

fn required(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn validate_basic(info: &BasicInfo) -> Result<(), ServiceError> {
    Validator::new()
        .check(
            info.name
                .as_deref()
                .is_some_and(|n| validation::char_len_between(n, 2, 50)),
            "Name must be between 2 and 50 characters",
        )
        .check(
            info.phone.as_deref().is_some_and(validation::is_valid_phone),
            "Please provide a valid 10-digit mobile number",
        )
        .finish()
}

fn validate_personal(details: &PersonalDetails) -> Result<(), ServiceError> {
    let dob_ok = details
        .date_of_birth
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .is_some_and(|dob| dob < Utc::now().date_naive());
    Validator::new()
        .check(dob_ok, "Date of birth must be a past date in YYYY-MM-DD format")
        .check(
            details
                .gender
                .as_deref()
                .is_some_and(|g| GENDERS.contains(&g)),
            "Gender must be male, female or other",
        )
        .check(required(&details.address), "Address is required")
        .check(
            details
                .pincode
                .as_deref()
                .map_or(true, validation::is_valid_pincode),
            "Pincode must be 6 digits",
        )
        .finish()
}

pub fn validate_academic(info: &AcademicInfo) -> Result<(), ServiceError> {
    let max_year = i64::from(Utc::now().year()) + 1;
    let percentage_ok = |p: Option<f64>| p.map_or(true, |v| (0.0..=100.0).contains(&v));
    let year_ok = |y: Option<i64>| y.map_or(true, |v| (1980..=max_year).contains(&v));
    Validator::new()
        .check(
            percentage_ok(info.class_10_percentage),
            "Class 10 percentage must be between 0 and 100",
        )
        .check(
            percentage_ok(info.class_12_percentage),
            "Class 12 percentage must be between 0 and 100",
        )
        .check(year_ok(info.class_10_year), "Invalid class 10 year")
        .check(year_ok(info.class_12_year), "Invalid class 12 year")
        .check(
            info.class_12_stream
                .as_deref()
                .map_or(true, |s| STREAMS.contains(&s)),
            "Class 12 stream must be science, commerce, arts or vocational",
        )
        .finish()
}

pub fn validate_family(info: &FamilyInfo) -> Result<(), ServiceError> {
    let phone_ok = |p: &Option<String>| p.as_deref().map_or(true, validation::is_valid_phone);
    Validator::new()
        .check(phone_ok(&info.father_phone), "Invalid father phone number")
        .check(phone_ok(&info.mother_phone), "Invalid mother phone number")
        .check(phone_ok(&info.guardian_phone), "Invalid guardian phone number")
        .finish()
}

async fn advance_step(
    pool: &SqlitePool,
    user_id: &str,
    next: i64,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        UPDATE "users"
        SET "registration_step" = MAX("registration_step", ?), "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(next.min(TOTAL_REGISTRATION_STEPS))
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_registration_step(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    user: &User,
    step: i64,
    payload: serde_json::Value,
) -> Result<StepOutcome, ServiceError> {
    if !(1..=TOTAL_REGISTRATION_STEPS).contains(&step) {
        return Err(ServiceError::bad_request("Invalid step number"));
    }
    if step > user.registration_step + 1 {
        return Err(ServiceError::bad_request("Complete previous steps first"));
    }

    match step {
        1 => {
            let info: BasicInfo = parse_payload(payload)?;
            validate_basic(&info)?;
            sqlx::query(r#"UPDATE "users" SET "name" = ?, "phone" = ? WHERE "id" = ?"#)
                .bind(info.name.as_deref().map(str::trim))
                .bind(&info.phone)
                .bind(&user.id)
                .execute(pool)
                .await?;
        }
        2 => {}
        3 => {
            let aadhaar: AadhaarPayload = parse_payload(payload)?;
            let number = aadhaar.aadhaar_number.unwrap_or_default();
            store_aadhaar(pool, cipher, &user.id, &number).await?;
        }
        4 => {
            let details: PersonalDetails = parse_payload(payload)?;
            validate_personal(&details)?;
            sqlx::query(
                r#"
                UPDATE "users"
                SET "date_of_birth" = ?, "gender" = ?, "address" = ?, "city" = ?, "state" = ?, "pincode" = ?
                WHERE "id" = ?
                "#,
            )
            .bind(&details.date_of_birth)
            .bind(&details.gender)
            .bind(&details.address)
            .bind(&details.city)
            .bind(&details.state)
            .bind(&details.pincode)
            .bind(&user.id)
            .execute(pool)
            .await?;
        }
        5 => {
            let info: AcademicInfo = parse_payload(payload)?;
            validate_academic(&info)?;
            write_academic(pool, &user.id, &info).await?;
        }
        6 => {
            let info: FamilyInfo = parse_payload(payload)?;
            validate_family(&info)?;
            write_family(pool, &user.id, &info).await?;
        }
        7 => {
            let docs: DocumentsPayload = parse_payload(payload)?;
            if !docs.documents_acknowledged {
                return Err(ServiceError::validation(
                    "Documents must be acknowledged before continuing",
                ));
            }
            sqlx::query(r#"UPDATE "users" SET "documents_acknowledged" = 1 WHERE "id" = ?"#)
                .bind(&user.id)
                .execute(pool)
                .await?;
        }
        8 => {}
        _ => {
            mark_registration_completed(pool, &user.id).await?;
        }
    }

    advance_step(pool, &user.id, step + 1).await?;
    let updated = get(pool, &user.id).await?;
    tracing::debug!(user_id = %user.id, step, current = updated.registration_step, "registration step saved");

    Ok(StepOutcome {
        step,
        current_step: updated.registration_step,
        registration_completed: updated.registration_completed,
    })
}

async fn mark_registration_completed(pool: &SqlitePool, user_id: &str) -> Result<(), ServiceError> {
    let now = now_iso();
    sqlx::query(
        r#"
        UPDATE "users"
        SET "registration_completed" = 1,
            "registration_completed_at" = COALESCE("registration_completed_at", ?),
            "account_status" = 'active',
            "registration_step" = ?,
            "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&now)
    .bind(TOTAL_REGISTRATION_STEPS)
    .bind(&now)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub fn missing_registration_fields(user: &User) -> Vec<&'static str> {
    let checks: [(&'static str, bool); 9] = [
        ("name", !user.name.trim().is_empty()),
        ("phone", required(&user.phone)),
        ("date_of_birth", required(&user.date_of_birth)),
        ("gender", required(&user.gender)),
        ("address", required(&user.address)),
        ("class_10_percentage", user.class_10_percentage.is_some()),
        ("class_12_percentage", user.class_12_percentage.is_some()),
        ("father_name", required(&user.father_name)),
        ("documents_acknowledged", user.documents_acknowledged),
    ];
    checks
        .into_iter()
        .filter_map(|(field, present)| (!present).then_some(field))
        .collect()
}

pub async fn complete_registration(pool: &SqlitePool, user: &User) -> Result<User, ServiceError> {
    let missing = missing_registration_fields(user);
    if !missing.is_empty() {
        return Err(ServiceError::bad_request(format!(
            "Registration incomplete. Missing fields: {}",
            missing.join(", ")
        )));
    }
    mark_registration_completed(pool, &user.id).await?;
    tracing::info!(user_id = %user.id, "registration completed");
    get(pool, &user.id).await
}

// ---------------------------------------------------------------------------
// Profile sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub college_name: Option<String>,
    pub course_name: Option<String>,
    pub admission_year: Option<i64>,
}

pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<User, ServiceError> {
    Validator::new()
        .check(
            update
                .name
                .as_deref()
                .map_or(true, |n| validation::char_len_between(n, 2, 50)),
            "Name must be between 2 and 50 characters",
        )
        .check(
            update.phone.as_deref().map_or(true, validation::is_valid_phone),
            "Please provide a valid 10-digit mobile number",
        )
        .check(
            update
                .gender
                .as_deref()
                .map_or(true, |g| GENDERS.contains(&g)),
            "Gender must be male, female or other",
        )
        .check(
            update
                .pincode
                .as_deref()
                .map_or(true, validation::is_valid_pincode),
            "Pincode must be 6 digits",
        )
        .check(
            update
                .date_of_birth
                .as_deref()
                .map_or(true, |d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok()),
            "Date of birth must be in YYYY-MM-DD format",
        )
        .finish()?;

    sqlx::query(
        r#"
        UPDATE "users"
        SET "name" = COALESCE(?, "name"),
            "phone" = COALESCE(?, "phone"),
            "date_of_birth" = COALESCE(?, "date_of_birth"),
            "gender" = COALESCE(?, "gender"),
            "address" = COALESCE(?, "address"),
            "city" = COALESCE(?, "city"),
            "state" = COALESCE(?, "state"),
            "pincode" = COALESCE(?, "pincode"),
            "college_name" = COALESCE(?, "college_name"),
            "course_name" = COALESCE(?, "course_name"),
            "admission_year" = COALESCE(?, "admission_year"),
            "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(update.name.as_deref().map(str::trim))
    .bind(&update.phone)
    .bind(&update.date_of_birth)
    .bind(&update.gender)
    .bind(&update.address)
    .bind(&update.city)
    .bind(&update.state)
    .bind(&update.pincode)
    .bind(&update.college_name)
    .bind(&update.course_name)
    .bind(update.admission_year)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;

    get(pool, user_id).await
}

async fn write_academic(pool: &SqlitePool, user_id: &str, info: &AcademicInfo) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        UPDATE "users"
        SET "class_10_board" = COALESCE(?, "class_10_board"),
            "class_10_year" = COALESCE(?, "class_10_year"),
            "class_10_percentage" = COALESCE(?, "class_10_percentage"),
            "class_12_board" = COALESCE(?, "class_12_board"),
            "class_12_year" = COALESCE(?, "class_12_year"),
            "class_12_percentage" = COALESCE(?, "class_12_percentage"),
            "class_12_stream" = COALESCE(?, "class_12_stream"),
            "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&info.class_10_board)
    .bind(info.class_10_year)
    .bind(info.class_10_percentage)
    .bind(&info.class_12_board)
    .bind(info.class_12_year)
    .bind(info.class_12_percentage)
    .bind(&info.class_12_stream)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn write_family(pool: &SqlitePool, user_id: &str, info: &FamilyInfo) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        UPDATE "users"
        SET "father_name" = COALESCE(?, "father_name"),
            "father_occupation" = COALESCE(?, "father_occupation"),
            "father_phone" = COALESCE(?, "father_phone"),
            "mother_name" = COALESCE(?, "mother_name"),
            "mother_occupation" = COALESCE(?, "mother_occupation"),
            "mother_phone" = COALESCE(?, "mother_phone"),
            "guardian_name" = COALESCE(?, "guardian_name"),
            "guardian_relation" = COALESCE(?, "guardian_relation"),
            "guardian_phone" = COALESCE(?, "guardian_phone"),
            "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&info.father_name)
    .bind(&info.father_occupation)
    .bind(&info.father_phone)
    .bind(&info.mother_name)
    .bind(&info.mother_occupation)
    .bind(&info.mother_phone)
    .bind(&info.guardian_name)
    .bind(&info.guardian_relation)
    .bind(&info.guardian_phone)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_academic(
    pool: &SqlitePool,
    user_id: &str,
    info: &AcademicInfo,
) -> Result<AcademicInfo, ServiceError> {
    validate_academic(info)?;
    write_academic(pool, user_id, info).await?;
    let user = get(pool, user_id).await?;
    Ok(AcademicInfo {
        class_10_board: user.class_10_board,
        class_10_year: user.class_10_year,
        class_10_percentage: user.class_10_percentage,
        class_12_board: user.class_12_board,
        class_12_year: user.class_12_year,
        class_12_percentage: user.class_12_percentage,
        class_12_stream: user.class_12_stream,
    })
}

pub async fn update_family(
    pool: &SqlitePool,
    user_id: &str,
    info: &FamilyInfo,
) -> Result<FamilyInfo, ServiceError> {
    validate_family(info)?;
    write_family(pool, user_id, info).await?;
    let user = get(pool, user_id).await?;
    Ok(FamilyInfo {
        father_name: user.father_name,
        father_occupation: user.father_occupation,
        father_phone: user.father_phone,
        mother_name: user.mother_name,
        mother_occupation: user.mother_occupation,
        mother_phone: user.mother_phone,
        guardian_name: user.guardian_name,
        guardian_relation: user.guardian_relation,
        guardian_phone: user.guardian_phone,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub profile_visible: Option<bool>,
    pub email_visible: Option<bool>,
    pub phone_visible: Option<bool>,
}

pub async fn update_privacy(
    pool: &SqlitePool,
    user_id: &str,
    settings: &PrivacySettings,
) -> Result<PrivacySettings, ServiceError> {
    sqlx::query(
        r#"
        UPDATE "users"
        SET "profile_visible" = COALESCE(?, "profile_visible"),
            "email_visible" = COALESCE(?, "email_visible"),
            "phone_visible" = COALESCE(?, "phone_visible"),
            "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(settings.profile_visible)
    .bind(settings.email_visible)
    .bind(settings.phone_visible)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;

    let user = get(pool, user_id).await?;
    Ok(PrivacySettings {
        profile_visible: Some(user.profile_visible),
        email_visible: Some(user.email_visible),
        phone_visible: Some(user.phone_visible),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollegeInfo {
    pub college_name: Option<String>,
    pub course_name: Option<String>,
    pub admission_year: Option<i64>,
}

pub async fn update_college_info(
    pool: &SqlitePool,
    user_id: &str,
    info: &CollegeInfo,
) -> Result<User, ServiceError> {
    let max_year = i64::from(Utc::now().year()) + 1;
    Validator::new()
        .check(
            info.college_name
                .as_deref()
                .map_or(true, |n| validation::char_len_between(n, 2, 200)),
            "College name must be between 2 and 200 characters",
        )
        .check(
            info.admission_year
                .map_or(true, |y| (1980..=max_year).contains(&y)),
            "Invalid admission year",
        )
        .finish()?;

    update_profile(
        pool,
        user_id,
        &ProfileUpdate {
            college_name: info.college_name.clone(),
            course_name: info.course_name.clone(),
            admission_year: info.admission_year,
            ..ProfileUpdate::default()
        },
    )
    .await
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct VerificationStatus {
    pub email_verified: bool,
    pub phone_verified: bool,
    pub aadhaar_verified: bool,
    pub account_status: String,
    pub masked_email: String,
    pub masked_phone: Option<String>,
    pub masked_aadhaar: Option<String>,
}

pub fn verification_status(user: &User) -> VerificationStatus {
    VerificationStatus {
        email_verified: user.email_verified,
        phone_verified: user.phone_verified,
        aadhaar_verified: user.aadhaar_verified,
        account_status: user.account_status.clone(),
        masked_email: mask_email(&user.email),
        masked_phone: user.phone.as_deref().map(mask_phone),
        masked_aadhaar: user.aadhaar_masked.clone(),
    }
}

async fn store_aadhaar(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    user_id: &str,
    number: &str,
) -> Result<String, ServiceError> {
    let number = number.trim();
    if !validation::is_valid_aadhaar(number) {
        return Err(ServiceError::validation("Aadhaar number must be 12 digits"));
    }

    let sealed = cipher
        .encrypt(number)
        .map_err(|err| ServiceError::Internal(format!("aadhaar encryption failed: {err}")))?;
    let masked = mask_aadhaar(number);

    sqlx::query(
        r#"
        UPDATE "users"
        SET "aadhaar_encrypted" = ?, "aadhaar_iv" = ?, "aadhaar_auth_tag" = ?, "aadhaar_masked" = ?,
            "aadhaar_verified" = 1, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&sealed.encrypted)
    .bind(&sealed.iv)
    .bind(&sealed.auth_tag)
    .bind(&masked)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(masked)
}

pub async fn verify_aadhaar(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    user_id: &str,
    number: &str,
) -> Result<String, ServiceError> {
    let masked = store_aadhaar(pool, cipher, user_id, number).await?;
    tracing::info!(user_id, "aadhaar verified");
    Ok(masked)
}

/// Decrypts the stored Aadhaar number, if any.
pub async fn reveal_aadhaar(
    pool: &SqlitePool,
    cipher: &FieldCipher,
    user_id: &str,
) -> Result<Option<String>, ServiceError> {
    let row = sqlx::query(
        r#"SELECT "aadhaar_encrypted", "aadhaar_iv", "aadhaar_auth_tag" FROM "users" WHERE "id" = ?"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("User not found"))?;

    let encrypted: Option<String> = row.try_get("aadhaar_encrypted")?;
    let iv: Option<String> = row.try_get("aadhaar_iv")?;
    let auth_tag: Option<String> = row.try_get("aadhaar_auth_tag")?;
    let (Some(encrypted), Some(iv), Some(auth_tag)) = (encrypted, iv, auth_tag) else {
        return Ok(None);
    };

    let sealed = crate::services::encryption::SealedField {
        encrypted,
        iv,
        auth_tag,
    };
    cipher
        .decrypt(&sealed)
        .map(Some)
        .map_err(|err| ServiceError::Internal(format!("aadhaar decryption failed: {err}")))
}

// ---------------------------------------------------------------------------
// Dashboard, statistics and achievements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ProgressFlags {
    pub registration_completed: bool,
    pub assessment_completed: bool,
    pub registration_step: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PuzzleStats {
    pub attempts: i64,
    pub solved: i64,
    pub coins_earned: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: PublicProfile,
    pub progress: ProgressFlags,
    pub latest_assessment: Option<assessment::AssessmentSummary>,
    pub coin_balance: i64,
    pub recent_transactions: Vec<CoinTransaction>,
    pub puzzle_stats: PuzzleStats,
    pub forum_posts: i64,
}

async fn puzzle_stats(pool: &SqlitePool, user_id: &str) -> Result<PuzzleStats, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT
          COUNT(*) AS "attempts",
          COALESCE(SUM(CASE WHEN "status" = 'correct' THEN 1 ELSE 0 END), 0) AS "solved",
          COALESCE(SUM("coins_earned"), 0) AS "coins"
        FROM "puzzle_attempts"
        WHERE "user_id" = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(PuzzleStats {
        attempts: row.try_get("attempts")?,
        solved: row.try_get("solved")?,
        coins_earned: row.try_get("coins")?,
    })
}

pub async fn dashboard(pool: &SqlitePool, user: &User) -> Result<Dashboard, ServiceError> {
    Ok(Dashboard {
        user: user.public_profile(),
        progress: ProgressFlags {
            registration_completed: user.registration_completed,
            assessment_completed: user.assessment_completed,
            registration_step: user.registration_step,
        },
        latest_assessment: assessment::latest_summary(pool, &user.id).await?,
        coin_balance: user.total_coins,
        recent_transactions: coins::recent_transactions(pool, &user.id, 5).await?,
        puzzle_stats: puzzle_stats(pool, &user.id).await?,
        forum_posts: user.forum_posts,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub registration_progress: i64,
    pub registration_completed: bool,
    pub assessment_completed: bool,
    pub total_coins: i64,
    pub current_streak: i64,
    pub next_steps: Vec<&'static str>,
}

pub fn progress(user: &User) -> Progress {
    let registration_progress = if user.registration_completed {
        100
    } else {
        ((user.registration_step - 1).max(0) * 100) / TOTAL_REGISTRATION_STEPS
    };

    let mut next_steps = Vec::new();
    if !user.registration_completed {
        next_steps.push("Complete your registration");
    }
    if !user.assessment_completed {
        next_steps.push("Take career assessment");
    }
    next_steps.push("Explore college options");
    next_steps.push("Join community forums");

    Progress {
        registration_progress,
        registration_completed: user.registration_completed,
        assessment_completed: user.assessment_completed,
        total_coins: user.total_coins,
        current_streak: user.current_streak,
        next_steps,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_coins: i64,
    pub current_streak: i64,
    pub puzzles_solved: i64,
    pub puzzle_attempts: i64,
    pub forum_posts: i64,
    pub reputation_score: i64,
    pub assessments_taken: i64,
    pub achievements_unlocked: usize,
}

pub async fn statistics(pool: &SqlitePool, user: &User) -> Result<Statistics, ServiceError> {
    let assessments_taken: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "assessments" WHERE "user_id" = ? AND "status" = 'completed'"#,
    )
    .bind(&user.id)
    .fetch_one(pool)
    .await?;
    let puzzles = puzzle_stats(pool, &user.id).await?;
    let unlocked = achievements(pool, user)
        .await?
        .iter()
        .filter(|a| a.unlocked)
        .count();

    Ok(Statistics {
        total_coins: user.total_coins,
        current_streak: user.current_streak,
        puzzles_solved: user.puzzles_solved,
        puzzle_attempts: puzzles.attempts,
        forum_posts: user.forum_posts,
        reputation_score: user.reputation_score,
        assessments_taken,
        achievements_unlocked: unlocked,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub unlocked: bool,
    pub unlocked_at: Option<String>,
}

async fn nth_correct_attempt_at(
    pool: &SqlitePool,
    user_id: &str,
    nth: i64,
) -> Result<Option<String>, ServiceError> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT "created_at" FROM "puzzle_attempts"
        WHERE "user_id" = ? AND "status" = 'correct'
        ORDER BY "created_at" ASC
        LIMIT 1 OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(nth - 1)
    .fetch_optional(pool)
    .await?)
}

pub async fn achievements(pool: &SqlitePool, user: &User) -> Result<Vec<Achievement>, ServiceError> {
    let first_post_at: Option<String> = sqlx::query_scalar(
        r#"SELECT MIN("created_at") FROM "forum_posts" WHERE "user_id" = ?"#,
    )
    .bind(&user.id)
    .fetch_one(pool)
    .await?;
    let hundred_coins_at: Option<String> = sqlx::query_scalar(
        r#"
        SELECT MIN("created_at") FROM "coin_transactions"
        WHERE "user_id" = ? AND "balance_after" >= 100
        "#,
    )
    .bind(&user.id)
    .fetch_one(pool)
    .await?;
    let first_solve_at = nth_correct_attempt_at(pool, &user.id, 1).await?;
    let tenth_solve_at = nth_correct_attempt_at(pool, &user.id, 10).await?;

    Ok(vec![
        Achievement {
            id: "registration_complete",
            name: "Registration Complete",
            description: "Complete your profile registration",
            unlocked: user.registration_completed,
            unlocked_at: user.registration_completed_at.clone(),
        },
        Achievement {
            id: "first_assessment",
            name: "First Assessment",
            description: "Take your first career assessment",
            unlocked: user.assessment_completed,
            unlocked_at: user.assessment_completed_at.clone(),
        },
        Achievement {
            id: "first_puzzle",
            name: "Puzzle Solver",
            description: "Solve your first daily puzzle",
            unlocked: first_solve_at.is_some(),
            unlocked_at: first_solve_at,
        },
        Achievement {
            id: "ten_puzzles",
            name: "Puzzle Master",
            description: "Solve 10 puzzles",
            unlocked: tenth_solve_at.is_some(),
            unlocked_at: tenth_solve_at,
        },
        Achievement {
            id: "first_post",
            name: "Community Voice",
            description: "Publish your first forum post",
            unlocked: first_post_at.is_some(),
            unlocked_at: first_post_at,
        },
        Achievement {
            id: "hundred_coins",
            name: "Coin Collector",
            description: "Hold 100 coins at once",
            unlocked: hundred_coins_at.is_some(),
            unlocked_at: hundred_coins_at,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_user() -> User {
        User {
            id: "u1".into(),
            email: "asha@example.com".into(),
            password_hash: String::new(),
            name: "Asha".into(),
            phone: None,
            role: "student".into(),
            account_status: "pending_verification".into(),
            email_verified: false,
            phone_verified: false,
            aadhaar_masked: None,
            aadhaar_verified: false,
            date_of_birth: None,
            gender: None,
            address: None,
            city: None,
            state: None,
            pincode: None,
            class_10_board: None,
            class_10_year: None,
            class_10_percentage: None,
            class_12_board: None,
            class_12_year: None,
            class_12_percentage: None,
            class_12_stream: None,
            father_name: None,
            father_occupation: None,
            father_phone: None,
            mother_name: None,
            mother_occupation: None,
            mother_phone: None,
            guardian_name: None,
            guardian_relation: None,
            guardian_phone: None,
            documents_acknowledged: false,
            registration_step: 1,
            registration_completed: false,
            registration_completed_at: None,
            assessment_completed: false,
            assessment_completed_at: None,
            total_coins: 0,
            current_streak: 0,
            puzzles_solved: 0,
            forum_posts: 0,
            reputation_score: 0,
            college_name: None,
            course_name: None,
            admission_year: None,
            profile_visible: true,
            email_visible: false,
            phone_visible: false,
            last_login: None,
            login_attempts: 0,
            account_locked_until: None,
            created_at: now_iso(),
            updated_at: now_iso(),
        }
    }

    #[test]
    fn test_registration_status_step_names() {
        let status = registration_status(&blank_user());
        assert_eq!(status.total_steps, 9);
        assert_eq!(status.steps_completed, 0);
        assert_eq!(status.step_details.len(), 9);
        assert_eq!(status.step_details[2].name, "Aadhaar Verification");
        assert_eq!(status.step_details[8].step, 9);
        assert!(status.step_details.iter().all(|s| !s.completed));
    }

    #[test]
    fn test_missing_fields_listed_in_order() {
        let mut user = blank_user();
        user.phone = Some("9876543210".into());
        user.father_name = Some("Ravi".into());
        let missing = missing_registration_fields(&user);
        assert_eq!(
            missing,
            vec![
                "date_of_birth",
                "gender",
                "address",
                "class_10_percentage",
                "class_12_percentage",
                "documents_acknowledged"
            ]
        );
    }

    #[test]
    fn test_progress_percentage() {
        let mut user = blank_user();
        user.registration_step = 4;
        assert_eq!(progress(&user).registration_progress, 33);
        user.registration_completed = true;
        assert_eq!(progress(&user).registration_progress, 100);
    }

    #[test]
    fn test_lock_window() {
        let mut user = blank_user();
        assert!(!is_locked(&user));
        user.account_locked_until =
            Some(crate::services::iso_from(Utc::now() + chrono::Duration::minutes(5)));
        assert!(is_locked(&user));
        user.account_locked_until =
            Some(crate::services::iso_from(Utc::now() - chrono::Duration::minutes(5)));
        assert!(!is_locked(&user));
    }

    #[test]
    fn test_academic_bounds() {
        let ok = AcademicInfo {
            class_10_percentage: Some(88.5),
            class_12_stream: Some("science".into()),
            ..AcademicInfo::default()
        };
        assert!(validate_academic(&ok).is_ok());
        let bad = AcademicInfo {
            class_12_percentage: Some(104.0),
            ..AcademicInfo::default()
        };
        assert!(matches!(
            validate_academic(&bad),
            Err(ServiceError::Validation(_))
        ));
    }
}
