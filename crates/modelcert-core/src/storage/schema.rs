pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS certifications (
  model_id TEXT NOT NULL,
  region TEXT NOT NULL,
  vendor TEXT,
  status TEXT NOT NULL,
  tests_passed INTEGER NOT NULL DEFAULT 0,
  tests_failed INTEGER NOT NULL DEFAULT 0,
  success_rate REAL NOT NULL DEFAULT 0,
  avg_latency_ms INTEGER NOT NULL DEFAULT 0,
  last_error TEXT,
  error_category TEXT,
  error_severity TEXT,
  last_tested_at TEXT NOT NULL,
  certified_at TEXT,
  expires_at TEXT,
  failure_reasons_json TEXT NOT NULL DEFAULT '[]',
  failed_probes_json TEXT NOT NULL DEFAULT '[]',
  rating REAL,
  badge TEXT,
  PRIMARY KEY (model_id, region)
);

CREATE INDEX IF NOT EXISTS idx_certifications_status ON certifications(status);
"#;
