#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Region suffixes ("es-MX", "en_US") select the base language.
        let base = s.trim().split(['-', '_']).next().unwrap_or_default();
        match base.to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "es" => Ok(Self::Es),
            _ => Err(format!("unsupported locale '{s}' (one of: en, es)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NoTasks,
    Completed,
    Pending,
    Page,
    Of,
    Error,
    AddError,
    UpdateError,
    DeleteError,
    StatusUpdateError,
    TaskNotFound,
    LoginError,
    SignedOut,
    NoErrors,
    ErrorsCleared,
    AccessDenied,
}

#[must_use]
pub fn text(locale: Locale, msg: Message) -> &'static str {
    use Message as M;
    match locale {
        Locale::En => match msg {
            M::NoTasks => "No tasks found",
            M::Completed => "Completed",
            M::Pending => "Pending",
            M::Page => "Page",
            M::Of => "of",
            M::Error => "Error",
            M::AddError => "Failed to add task",
            M::UpdateError => "Failed to update task",
            M::DeleteError => "Failed to delete task",
            M::StatusUpdateError => "Failed to update task status",
            M::TaskNotFound => "Task not found",
            M::LoginError => "Invalid email or password",
            M::SignedOut => "Signed out",
            M::NoErrors => "No errors logged",
            M::ErrorsCleared => "All errors have been cleared",
            M::AccessDenied => "Access denied",
        },
        Locale::Es => match msg {
            M::NoTasks => "No se encontraron tareas",
            M::Completed => "Completada",
            M::Pending => "Pendiente",
            M::Page => "Página",
            M::Of => "de",
            M::Error => "Error",
            M::AddError => "No se pudo agregar la tarea",
            M::UpdateError => "No se pudo actualizar la tarea",
            M::DeleteError => "No se pudo eliminar la tarea",
            M::StatusUpdateError => "No se pudo actualizar el estado de la tarea",
            M::TaskNotFound => "Tarea no encontrada",
            M::LoginError => "Correo o contraseña no válidos",
            M::SignedOut => "Sesión cerrada",
            M::NoErrors => "No hay errores registrados",
            M::ErrorsCleared => "Se han borrado todos los errores",
            M::AccessDenied => "Acceso denegado",
        },
    }
}
