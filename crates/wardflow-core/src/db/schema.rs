//! SQLite schema definition.

/// Complete database schema for wardflow.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,                          -- 'P-<n>'
    name TEXT NOT NULL,
    gender TEXT,
    date_of_birth TEXT,
    phone TEXT,
    address TEXT,
    patient_type TEXT NOT NULL DEFAULT 'cash',    -- cash, hmo
    provider_id TEXT,                             -- set when patient_type = 'hmo'
    is_staff INTEGER NOT NULL DEFAULT 0,
    balance INTEGER NOT NULL DEFAULT 0,           -- integer Naira
    visits TEXT NOT NULL DEFAULT '[]',            -- JSON array of Visit
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);
CREATE INDEX IF NOT EXISTS idx_patients_type ON patients(patient_type);

-- ============================================================================
-- Bills
-- ============================================================================

CREATE TABLE IF NOT EXISTS bills (
    id TEXT PRIMARY KEY,                          -- 'BILL-<n>' / 'BILL-DEP-<n>'
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    bill_type TEXT NOT NULL,                      -- consultation, pharmacy, laboratory, medication, deposit, vaccination, other
    status TEXT NOT NULL DEFAULT 'pending',       -- pending, paid, cancelled, hmo_pending, billed, dispensed
    items TEXT NOT NULL DEFAULT '[]',             -- JSON array of BillItem
    discount_percent INTEGER,
    original_total INTEGER,
    staff_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_bills_patient ON bills(patient_id);
CREATE INDEX IF NOT EXISTS idx_bills_status ON bills(status);

-- ============================================================================
-- Lab Requests
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_requests (
    id TEXT PRIMARY KEY,                          -- 'LAB-REQ-<n>'
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    visit_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',       -- pending, billed, in_progress, completed
    tests TEXT NOT NULL DEFAULT '[]',             -- JSON array of LabTestItem
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_lab_requests_patient ON lab_requests(patient_id);
CREATE INDEX IF NOT EXISTS idx_lab_requests_status ON lab_requests(status);

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,                          -- 'PRES-<n>'
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    visit_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',       -- pending, billed, hmo_pending, paid, hmo_approved, dispensed
    items TEXT NOT NULL DEFAULT '[]',             -- JSON array of PrescriptionItem
    injectables_split INTEGER NOT NULL DEFAULT 0,
    bill_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_id);
CREATE INDEX IF NOT EXISTS idx_prescriptions_status ON prescriptions(status);

-- ============================================================================
-- HMO Claims
-- ============================================================================

CREATE TABLE IF NOT EXISTS hmo_claims (
    id TEXT PRIMARY KEY,                          -- 'HMO-<dept>-<digest>'
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    provider_id TEXT NOT NULL,
    source_department TEXT NOT NULL,              -- DOC, PHA, LAB, INJ
    source_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',       -- pending, completed, rejected
    items TEXT NOT NULL DEFAULT '[]',             -- JSON array of ClaimItem
    approval_code TEXT,
    rejection_reason TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(source_department, source_id)
);

CREATE INDEX IF NOT EXISTS idx_claims_patient ON hmo_claims(patient_id);
CREATE INDEX IF NOT EXISTS idx_claims_status ON hmo_claims(status);

-- ============================================================================
-- Catalog (stock-bearing)
-- ============================================================================

CREATE TABLE IF NOT EXISTS medicines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 0,             -- integer Naira
    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    injectable INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS consumables (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 0,
    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS vaccines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 0,
    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS lab_test_types (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 0,
    parameters TEXT NOT NULL DEFAULT '[]',        -- JSON array of LabParameter
    active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_medicines_name ON medicines(name);

-- ============================================================================
-- Directory
-- ============================================================================

CREATE TABLE IF NOT EXISTS staff (
    id TEXT PRIMARY KEY,                          -- 'STAFF-<n>'
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS hmo_providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);
"#;
