//! SQLite schema definition.

/// Complete database schema for the prescribing workflow.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    mrn TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    gender TEXT NOT NULL CHECK (gender IN ('male', 'female', 'other')),
    date_of_birth TEXT NOT NULL,                 -- YYYY-MM-DD
    mobile TEXT NOT NULL,
    email TEXT,
    address TEXT,
    allergies TEXT NOT NULL DEFAULT '[]',        -- JSON array of strings
    blood_group TEXT,
    emergency_contact_name TEXT,
    emergency_contact_mobile TEXT,
    hospital_id TEXT,
    assigned_doctor_id TEXT,
    is_discharged INTEGER NOT NULL DEFAULT 0,
    discharge_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(full_name);
CREATE INDEX IF NOT EXISTS idx_patients_mobile ON patients(mobile);

-- ============================================================================
-- Doctors
-- ============================================================================

CREATE TABLE IF NOT EXISTS doctors (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    specialization TEXT NOT NULL,
    qualification TEXT NOT NULL DEFAULT '',
    license_number TEXT NOT NULL,
    hospital_id TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Prescriptions (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    doctor_id TEXT NOT NULL REFERENCES doctors(id),
    hospital_id TEXT,
    diagnosis TEXT NOT NULL CHECK (length(trim(diagnosis)) > 0),
    notes TEXT,
    prescription_date TEXT NOT NULL,             -- YYYY-MM-DD
    follow_up_date TEXT,                         -- YYYY-MM-DD
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id, created_at);

CREATE TABLE IF NOT EXISTS medications (
    id TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    position INTEGER NOT NULL,
    medicine_name TEXT NOT NULL CHECK (length(trim(medicine_name)) > 0),
    dosage TEXT NOT NULL CHECK (length(trim(dosage)) > 0),
    frequency TEXT NOT NULL,                     -- dose-timing code, e.g. 1-0-1
    timing TEXT NOT NULL,                        -- Before Food, After Food, ...
    duration_days INTEGER NOT NULL CHECK (duration_days >= 1),
    start_date TEXT NOT NULL,                    -- YYYY-MM-DD
    end_date TEXT NOT NULL,                      -- start_date + duration_days
    instructions TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (prescription_id, position)
);

CREATE INDEX IF NOT EXISTS idx_medications_prescription ON medications(prescription_id);
CREATE INDEX IF NOT EXISTS idx_medications_end_date ON medications(end_date);

-- Corrections are new prescriptions, never edits
CREATE TRIGGER IF NOT EXISTS prescriptions_append_only
BEFORE UPDATE OF patient_id, doctor_id, diagnosis, notes, prescription_date, follow_up_date
ON prescriptions
BEGIN
    SELECT RAISE(ABORT, 'Prescriptions are append-only');
END;

CREATE TRIGGER IF NOT EXISTS medications_append_only BEFORE UPDATE ON medications
BEGIN
    SELECT RAISE(ABORT, 'Medications are append-only');
END;

-- ============================================================================
-- Formulary
-- ============================================================================

CREATE TABLE IF NOT EXISTS formulary (
    code TEXT PRIMARY KEY,
    generic_name TEXT NOT NULL,
    aliases TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- FTS5 virtual table for full-text search
CREATE VIRTUAL TABLE IF NOT EXISTS formulary_fts USING fts5(
    code,
    generic_name,
    aliases,
    content='formulary',
    content_rowid='rowid'
);

-- Triggers to keep FTS5 in sync with main table
CREATE TRIGGER IF NOT EXISTS formulary_ai AFTER INSERT ON formulary BEGIN
    INSERT INTO formulary_fts(rowid, code, generic_name, aliases)
    VALUES (new.rowid, new.code, new.generic_name, new.aliases);
END;

CREATE TRIGGER IF NOT EXISTS formulary_ad AFTER DELETE ON formulary BEGIN
    INSERT INTO formulary_fts(formulary_fts, rowid, code, generic_name, aliases)
    VALUES ('delete', old.rowid, old.code, old.generic_name, old.aliases);
END;

CREATE TRIGGER IF NOT EXISTS formulary_au AFTER UPDATE ON formulary BEGIN
    INSERT INTO formulary_fts(formulary_fts, rowid, code, generic_name, aliases)
    VALUES ('delete', old.rowid, old.code, old.generic_name, old.aliases);
    INSERT INTO formulary_fts(rowid, code, generic_name, aliases)
    VALUES (new.rowid, new.code, new.generic_name, new.aliases);
END;

-- ============================================================================
-- Notification Outbox
-- ============================================================================

CREATE TABLE IF NOT EXISTS notification_outbox (
    id TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    channel TEXT NOT NULL CHECK (channel IN ('email')),
    recipient TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'sending', 'sent', 'skipped', 'failed')),
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_outbox_status ON notification_outbox(status);

-- ============================================================================
-- AI Assistant Interactions
-- ============================================================================

CREATE TABLE IF NOT EXISTS ai_interactions (
    id TEXT PRIMARY KEY,
    patient_id TEXT REFERENCES patients(id),
    query TEXT NOT NULL,
    response TEXT NOT NULL,
    is_red_flag INTEGER NOT NULL DEFAULT 0,
    language TEXT NOT NULL DEFAULT 'english',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_ai_interactions_patient ON ai_interactions(patient_id);
"#;
