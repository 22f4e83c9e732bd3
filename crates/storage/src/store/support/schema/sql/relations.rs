#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS item_references (
          src_item_pid INTEGER NOT NULL,
          dst_item_pid INTEGER NOT NULL,
          reference_type TEXT NOT NULL,
          PRIMARY KEY (src_item_pid, dst_item_pid)
        );

        CREATE TABLE IF NOT EXISTS feedback_mail_lists (
          item_id TEXT PRIMARY KEY,
          mail_list TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS site_license_info (
          organization_id INTEGER PRIMARY KEY,
          organization_name TEXT NOT NULL,
          receive_mail_flag TEXT NOT NULL DEFAULT 'F',
          mail_address TEXT,
          domain_name TEXT
        );

        CREATE TABLE IF NOT EXISTS site_license_ip_addresses (
          organization_id INTEGER NOT NULL
            REFERENCES site_license_info(organization_id) ON DELETE CASCADE,
          organization_no INTEGER NOT NULL,
          start_ip_address TEXT NOT NULL,
          finish_ip_address TEXT NOT NULL,
          PRIMARY KEY (organization_id, organization_no)
        );
"#;
