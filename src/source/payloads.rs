use serde::{Deserialize, Deserializer, Serialize};

/// Ids arrive as numbers from some deployments and as strings from others.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteDepartment {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub dept_name: String,
    pub dept_code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DepartmentRef {
    pub dept_code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteEmployee {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub emp_code: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub department: Option<DepartmentRef>,
    #[serde(default)]
    pub hire_date: Option<String>,
}

/// A row of the transaction report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTransaction {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub emp_code: String,
    #[serde(default)]
    pub dept_code: Option<String>,
    /// YYYY-MM-DD in the device's local time.
    pub att_date: String,
    /// HH:MM, sometimes padded with spaces.
    pub punch_time: String,
    #[serde(default)]
    pub punch_state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_page_parses_with_numeric_ids() {
        let body = r#"{
            "count": 2,
            "next": "http://clock.local/att/api/transactionReport/?page=2",
            "data": [
                {"id": 501, "emp_code": "100", "dept_code": "HQ", "att_date": "2025-07-28",
                 "punch_time": " 09:45 ", "punch_state": "Check In"},
                {"id": "502", "emp_code": "100", "att_date": "2025-07-28", "punch_time": "17:00"}
            ]
        }"#;

        let page: Page<RemoteTransaction> = serde_json::from_str(body).unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].id, "501");
        assert_eq!(page.data[1].id, "502");
        assert_eq!(page.data[1].dept_code, None);
        assert!(page.next.is_some());
    }

    #[test]
    fn last_page_has_no_next() {
        let page: Page<RemoteDepartment> =
            serde_json::from_str(r#"{"next": null, "data": [{"id": 1, "dept_name": "Head Office", "dept_code": "HQ"}]}"#)
                .unwrap();
        assert_eq!(page.next, None);
        assert_eq!(page.data[0].dept_code, "HQ");
    }

    #[test]
    fn employee_department_is_optional() {
        let page: Page<RemoteEmployee> = serde_json::from_str(
            r#"{"data": [
                {"id": 7, "emp_code": "100", "full_name": "Mona Adel", "department": {"dept_code": "HQ"}, "hire_date": "2024-01-15"},
                {"id": 8, "emp_code": "200", "full_name": "Karim", "department": null, "hire_date": null}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.data[0].department.as_ref().map(|d| d.dept_code.as_str()), Some("HQ"));
        assert!(page.data[1].department.is_none());
    }
}
