use std::fmt::{self, Display, Formatter};

use serde_json::Value;

/// Application-level status carried in the `response` field of every
/// structured reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    FunctionNotFound,
    DatabaseError,
    Forbidden,
    PrivilegeRequired,
    NotFound,
    ValidationError,
    NotAuthenticated,
    CustomError,
    InvalidData,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::FunctionNotFound => 400,
            Status::DatabaseError => 401,
            Status::Forbidden => 402,
            Status::PrivilegeRequired => 403,
            Status::NotFound => 404,
            Status::ValidationError => 407,
            Status::NotAuthenticated => 408,
            Status::CustomError => 409,
            Status::InvalidData => 410,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => Status::Ok,
            400 => Status::FunctionNotFound,
            401 => Status::DatabaseError,
            402 => Status::Forbidden,
            403 => Status::PrivilegeRequired,
            404 => Status::NotFound,
            407 => Status::ValidationError,
            408 => Status::NotAuthenticated,
            409 => Status::CustomError,
            410 => Status::InvalidData,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::FunctionNotFound => "FUNCTION_NOT_FOUND",
            Status::DatabaseError => "DATABASE_ERROR",
            Status::Forbidden => "FORBIDDEN",
            Status::PrivilegeRequired => "PRIVILEGE_REQUIRED",
            Status::NotFound => "NOT_FOUND",
            Status::ValidationError => "VALIDATION_ERROR",
            Status::NotAuthenticated => "NOT_AUTHENTICATED",
            Status::CustomError => "CUSTOM_ERROR",
            Status::InvalidData => "INVALID_DATA",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl From<Status> for Value {
    fn from(status: Status) -> Self {
        Value::from(status.code())
    }
}
