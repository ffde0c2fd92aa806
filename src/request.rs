//! Immutable description of one database operation and its logging/dispatch uri.

use serde_json::Value;
use std::fmt;

const POSTGRES_NID: &str = "postgresql";

/// DML verb of a request, fixed by the constructor used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Select,
    Insert,
    Update,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Select => "SELECT",
            Method::Insert => "INSERT",
            Method::Update => "UPDATE",
            Method::Delete => "DELETE",
        }
    }

    /// Namespace-specific segment of the uri.
    fn nss(self) -> &'static str {
        match self {
            Method::Select => "query",
            Method::Insert => "insert",
            Method::Update => "update",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column name and value, used for update set-lists and where clauses.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: Value,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn build_uri(method: Method, resource: &str) -> String {
    format!("urn:{}:{}.{}", POSTGRES_NID, method.nss(), resource)
}

pub fn build_query_uri(resource: &str) -> String {
    build_uri(Method::Select, resource)
}

pub fn build_insert_uri(resource: &str) -> String {
    build_uri(Method::Insert, resource)
}

pub fn build_update_uri(resource: &str) -> String {
    build_uri(Method::Update, resource)
}

pub fn build_delete_uri(resource: &str) -> String {
    build_uri(Method::Delete, resource)
}

#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    resource: String,
    uri: String,
    sql: String,
    args: Vec<Value>,
    values: Vec<Vec<Value>>,
    attrs: Vec<Attr>,
    where_: Vec<Attr>,
}

impl Request {
    fn new(method: Method, resource: impl Into<String>, sql: impl Into<String>) -> Self {
        let resource = resource.into();
        Request {
            method,
            uri: build_uri(method, &resource),
            resource,
            sql: sql.into(),
            args: Vec::new(),
            values: Vec::new(),
            attrs: Vec::new(),
            where_: Vec::new(),
        }
    }

    pub fn query(resource: impl Into<String>, sql: impl Into<String>, args: Vec<Value>) -> Self {
        let mut r = Request::new(Method::Select, resource, sql);
        r.args = args;
        r
    }

    /// Insert with one or more value rows; bind args are the rows flattened in order.
    pub fn insert(resource: impl Into<String>, sql: impl Into<String>, values: Vec<Vec<Value>>) -> Self {
        let mut r = Request::new(Method::Insert, resource, sql);
        r.args = values.iter().flatten().cloned().collect();
        r.values = values;
        r
    }

    /// Update; bind args are the set-list values followed by the where values.
    pub fn update(
        resource: impl Into<String>,
        sql: impl Into<String>,
        attrs: Vec<Attr>,
        where_: Vec<Attr>,
    ) -> Self {
        let mut r = Request::new(Method::Update, resource, sql);
        r.args = attrs
            .iter()
            .chain(where_.iter())
            .map(|a| a.value.clone())
            .collect();
        r.attrs = attrs;
        r.where_ = where_;
        r
    }

    pub fn delete(resource: impl Into<String>, sql: impl Into<String>, where_: Vec<Attr>) -> Self {
        let mut r = Request::new(Method::Delete, resource, sql);
        r.args = where_.iter().map(|a| a.value.clone()).collect();
        r.where_ = where_;
        r
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn values(&self) -> &[Vec<Value>] {
        &self.values
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    pub fn where_attrs(&self) -> &[Attr] {
        &self.where_
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uri_depends_only_on_method_and_resource() {
        let a = Request::query("rows", "select * from table", vec![]);
        let b = Request::query("rows", "select 1", vec![json!(1)]);
        assert_eq!(a.uri(), b.uri());
        assert_eq!(a.uri(), build_query_uri("rows"));
        assert_eq!(a.uri(), "urn:postgresql:query.rows");
    }

    #[test]
    fn builders_match_constructors() {
        assert_eq!(Request::insert("t", "insert", vec![]).uri(), build_insert_uri("t"));
        assert_eq!(Request::update("t", "update", vec![], vec![]).uri(), build_update_uri("t"));
        assert_eq!(Request::delete("t", "delete", vec![]).uri(), build_delete_uri("t"));
        assert_ne!(build_insert_uri("t"), build_update_uri("t"));
    }

    #[test]
    fn update_args_are_attrs_then_where() {
        let r = Request::update(
            "conditions",
            "UPDATE conditions",
            vec![Attr::new("temperature", 45.1234)],
            vec![Attr::new("location", "plano")],
        );
        assert_eq!(r.method(), Method::Update);
        assert_eq!(r.args(), &[json!(45.1234), json!("plano")]);
        assert_eq!(r.where_attrs().len(), 1);
    }

    #[test]
    fn insert_args_flatten_rows() {
        let r = Request::insert(
            "conditions",
            "INSERT INTO conditions (location,temperature) VALUES",
            vec![vec![json!("office"), json!(70)], vec![json!("garage"), json!(45.5)]],
        );
        assert_eq!(r.args().len(), 4);
        assert_eq!(r.args()[2], json!("garage"));
        assert_eq!(r.values().len(), 2);
    }
}
