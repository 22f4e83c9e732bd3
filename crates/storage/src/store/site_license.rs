#![forbid(unsafe_code)]

use super::item_type_names::{SiteLicenseFlags, set_site_license_flags_tx};
use super::support::now_ms;
use super::{StoreError, UnitOfWork};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NO_MAIL_FLAG: &str = "F";

/// An IP range given as octet lists, e.g. `["192", "168", "0", "1"]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLicenseAddress {
    pub start_ip_address: Vec<String>,
    pub finish_ip_address: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLicenseOrganization {
    pub organization_name: String,
    #[serde(default)]
    pub receive_mail_flag: Option<String>,
    #[serde(default)]
    pub mail_address: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub addresses: Vec<SiteLicenseAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLicenseUpdate {
    #[serde(default)]
    pub item_type: Option<SiteLicenseFlags>,
    /// `None` leaves organizations untouched; `Some` replaces all of them.
    #[serde(default)]
    pub site_license: Option<Vec<SiteLicenseOrganization>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteLicenseIpRange {
    pub organization_no: i64,
    pub start_ip_address: String,
    pub finish_ip_address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteLicenseRecord {
    pub organization_id: i64,
    pub organization_name: String,
    pub receive_mail_flag: String,
    pub mail_address: Option<String>,
    pub domain_name: Option<String>,
    pub addresses: Vec<SiteLicenseIpRange>,
}

pub struct SiteLicense;

impl SiteLicense {
    pub fn get_records(uow: &UnitOfWork<'_>) -> Result<Vec<SiteLicenseRecord>, StoreError> {
        let conn = uow.conn();

        let mut ranges: BTreeMap<i64, Vec<SiteLicenseIpRange>> = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT organization_id, organization_no, start_ip_address, finish_ip_address \
             FROM site_license_ip_addresses \
             ORDER BY organization_id ASC, organization_no ASC",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            ranges
                .entry(row.get::<_, i64>(0)?)
                .or_default()
                .push(SiteLicenseIpRange {
                    organization_no: row.get(1)?,
                    start_ip_address: row.get(2)?,
                    finish_ip_address: row.get(3)?,
                });
        }

        let mut stmt = conn.prepare(
            "SELECT organization_id, organization_name, receive_mail_flag, mail_address, domain_name \
             FROM site_license_info \
             ORDER BY organization_id ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let organization_id: i64 = row.get(0)?;
            out.push(SiteLicenseRecord {
                organization_id,
                organization_name: row.get(1)?,
                receive_mail_flag: row.get(2)?,
                mail_address: row.get(3)?,
                domain_name: row.get(4)?,
                addresses: ranges.remove(&organization_id).unwrap_or_default(),
            });
        }
        Ok(out)
    }

    /// Applies item-type license flags, then replaces every organization when
    /// `site_license` is given. Organization ids are renumbered from 1.
    pub fn update(uow: &mut UnitOfWork<'_>, request: &SiteLicenseUpdate) -> Result<(), StoreError> {
        let now = now_ms();
        uow.nested(|conn, _| {
            if let Some(flags) = request.item_type.as_ref() {
                set_site_license_flags_tx(conn, flags, now)?;
            }
            if let Some(organizations) = request.site_license.as_deref() {
                replace_organizations_tx(conn, organizations)?;
            }
            Ok(())
        })
    }
}

fn replace_organizations_tx(
    conn: &Connection,
    organizations: &[SiteLicenseOrganization],
) -> Result<(), StoreError> {
    conn.execute("DELETE FROM site_license_ip_addresses", [])?;
    conn.execute("DELETE FROM site_license_info", [])?;

    let mut insert_info = conn.prepare(
        "INSERT INTO site_license_info(organization_id, organization_name, receive_mail_flag, mail_address, domain_name) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut insert_range = conn.prepare(
        "INSERT INTO site_license_ip_addresses(organization_id, organization_no, start_ip_address, finish_ip_address) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    for (organization_id, organization) in (1_i64..).zip(organizations) {
        let mail_address = organization
            .mail_address
            .as_deref()
            .filter(|address| !address.is_empty());
        let receive_mail_flag = match mail_address {
            Some(_) => organization
                .receive_mail_flag
                .as_deref()
                .unwrap_or(NO_MAIL_FLAG),
            None => NO_MAIL_FLAG,
        };
        insert_info.execute(params![
            organization_id,
            organization.organization_name,
            receive_mail_flag,
            mail_address,
            organization.domain_name,
        ])?;

        for (organization_no, address) in (1_i64..).zip(&organization.addresses) {
            insert_range.execute(params![
                organization_id,
                organization_no,
                address.start_ip_address.join("."),
                address.finish_ip_address.join("."),
            ])?;
        }
    }
    Ok(())
}
