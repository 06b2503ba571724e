//! Canonical output schema: the fixed column set every bank-specific
//! extraction maps into, plus the header aliases downstream consumers use.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ExtractError;

/// Supported source banks. Each bank has its own pattern set; the canonical
/// schema is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    Itau,
    Santander,
    Indisa,
}

impl Bank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bank::Itau => "ITAU",
            Bank::Santander => "SANTANDER",
            Bank::Indisa => "INDISA",
        }
    }
}

impl FromStr for Bank {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ITAU" | "ITAÚ" => Ok(Bank::Itau),
            "SANTANDER" => Ok(Bank::Santander),
            "INDISA" => Ok(Bank::Indisa),
            other => Err(ExtractError::UnknownBank(other.to_string())),
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value kind of a canonical field, governing its normalization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text: names, addresses, comuna strings.
    Text,
    /// Digit identifiers: operation numbers, RUT body, check digit.
    Identifier,
    /// Money amounts in Chilean pesos, thousands-dotted in source text.
    Money,
    /// Percentage rates with a decimal part.
    Rate,
    /// Small plain integers (installment counts).
    Integer,
    Date,
}

/// The canonical columns of the unified result row. One value per field per
/// document, always present in the assembled record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Operacion,
    Rut,
    Dv,
    Nombre,
    Direccion,
    Comuna,
    FechaSuscripcion,
    MontoCredito,
    Cuotas,
    Tasa,
    MontoCuota,
    MontoUltimaCuota,
    FechaVencimientoPrimeraCuota,
    FechaVencimientoUltimaCuota,
    CuotaMorosa,
    FechaCuotaMorosa,
    Capital,
    Exhorto,
    Sucursal,
    Producto,
    NombreApoderado,
    NombreApoderado2,
}

/// All canonical fields in output-column order.
pub const ALL_FIELDS: [CanonicalField; 22] = [
    CanonicalField::Operacion,
    CanonicalField::Rut,
    CanonicalField::Dv,
    CanonicalField::Nombre,
    CanonicalField::Direccion,
    CanonicalField::Comuna,
    CanonicalField::FechaSuscripcion,
    CanonicalField::MontoCredito,
    CanonicalField::Cuotas,
    CanonicalField::Tasa,
    CanonicalField::MontoCuota,
    CanonicalField::MontoUltimaCuota,
    CanonicalField::FechaVencimientoPrimeraCuota,
    CanonicalField::FechaVencimientoUltimaCuota,
    CanonicalField::CuotaMorosa,
    CanonicalField::FechaCuotaMorosa,
    CanonicalField::Capital,
    CanonicalField::Exhorto,
    CanonicalField::Sucursal,
    CanonicalField::Producto,
    CanonicalField::NombreApoderado,
    CanonicalField::NombreApoderado2,
];

impl CanonicalField {
    /// Canonical header name, matching the unified export columns.
    pub fn header(&self) -> &'static str {
        match self {
            CanonicalField::Operacion => "OPERACION_1",
            CanonicalField::Rut => "RUT",
            CanonicalField::Dv => "DV",
            CanonicalField::Nombre => "NOMBRE",
            CanonicalField::Direccion => "DIRECCION",
            CanonicalField::Comuna => "COMUNA",
            CanonicalField::FechaSuscripcion => "FECHA_SUSCRIPCION_1",
            CanonicalField::MontoCredito => "MONTO_CREDITO_1",
            CanonicalField::Cuotas => "CUOTAS_1",
            CanonicalField::Tasa => "TASA_1",
            CanonicalField::MontoCuota => "MONTO_CUOTA_1",
            CanonicalField::MontoUltimaCuota => "MONTO_ULTIMA_CUOTA_1",
            CanonicalField::FechaVencimientoPrimeraCuota => "FECHA_VENCIMIENTO_1_CUOTA_1",
            CanonicalField::FechaVencimientoUltimaCuota => "FECHA_VENCIMIENTO_ULTIMA_CUOTA_1",
            CanonicalField::CuotaMorosa => "CUOTA_MOROSA_1",
            CanonicalField::FechaCuotaMorosa => "FECHA_CUOTA_MOROSA_1",
            CanonicalField::Capital => "CAPITAL_1",
            CanonicalField::Exhorto => "EXHORTO",
            CanonicalField::Sucursal => "SUCURSAL",
            CanonicalField::Producto => "PRODUCTO",
            CanonicalField::NombreApoderado => "NOMBRE_APODERADO",
            CanonicalField::NombreApoderado2 => "NOMBRE_APODERADO_2",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            CanonicalField::Operacion | CanonicalField::Rut | CanonicalField::Dv => {
                ValueKind::Identifier
            }
            CanonicalField::Nombre
            | CanonicalField::Direccion
            | CanonicalField::Comuna
            | CanonicalField::Exhorto
            | CanonicalField::Sucursal
            | CanonicalField::Producto
            | CanonicalField::NombreApoderado
            | CanonicalField::NombreApoderado2 => ValueKind::Text,
            CanonicalField::FechaSuscripcion
            | CanonicalField::FechaVencimientoPrimeraCuota
            | CanonicalField::FechaVencimientoUltimaCuota
            | CanonicalField::FechaCuotaMorosa => ValueKind::Date,
            CanonicalField::MontoCredito
            | CanonicalField::MontoCuota
            | CanonicalField::MontoUltimaCuota
            | CanonicalField::Capital => ValueKind::Money,
            CanonicalField::Cuotas | CanonicalField::CuotaMorosa => ValueKind::Integer,
            CanonicalField::Tasa => ValueKind::Rate,
        }
    }
}

impl FromStr for CanonicalField {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let up = s.trim().to_uppercase();
        ALL_FIELDS
            .iter()
            .find(|f| f.header() == up)
            .copied()
            .ok_or_else(|| ExtractError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

lazy_static! {
    /// Alternate header names seen in downstream sheets, lower-cased.
    static ref HEADER_ALIASES: HashMap<&'static str, CanonicalField> = {
        use CanonicalField::*;
        let entries: [(&'static str, CanonicalField); 43] = [
            ("operacion", Operacion),
            ("numero_operacion", Operacion),
            ("num_operacion", Operacion),
            ("op", Operacion),
            ("rut_cliente", Rut),
            ("rut cliente", Rut),
            ("cedula", Rut),
            ("digito_verificador", Dv),
            ("nombre_completo", Nombre),
            ("nombre completo", Nombre),
            ("razon social", Nombre),
            ("deudor", Nombre),
            ("cliente", Nombre),
            ("direccion", Direccion),
            ("domicilio", Direccion),
            ("domicilio particular", Direccion),
            ("ciudad", Comuna),
            ("localidad", Comuna),
            ("fecha_suscripcion", FechaSuscripcion),
            ("fecha_contrato", FechaSuscripcion),
            ("fecha_firma", FechaSuscripcion),
            ("monto", MontoCredito),
            ("monto_credito", MontoCredito),
            ("valor credito", MontoCredito),
            ("importe", MontoCredito),
            ("cuotas", Cuotas),
            ("num_cuotas", Cuotas),
            ("plazo", Cuotas),
            ("plazo_meses", Cuotas),
            ("tasa", Tasa),
            ("tasa_interes", Tasa),
            ("interes", Tasa),
            ("monto_cuota", MontoCuota),
            ("valor_cuota", MontoCuota),
            ("monto_ultima_cuota", MontoUltimaCuota),
            ("ultima_cuota", MontoUltimaCuota),
            ("capital", Capital),
            ("saldo_capital", Capital),
            ("tribunal", Exhorto),
            ("oficina", Sucursal),
            ("tipo_producto", Producto),
            ("apoderado_1", NombreApoderado),
            ("apoderado_2", NombreApoderado2),
        ];
        entries.iter().copied().collect()
    };
}

/// Resolve a downstream header name to its canonical field. Accepts both
/// canonical headers and configured aliases, case-insensitively.
pub fn resolve_header(name: &str) -> Option<CanonicalField> {
    if let Ok(field) = name.parse::<CanonicalField>() {
        return Some(field);
    }
    HEADER_ALIASES.get(name.trim().to_lowercase().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_round_trips_through_its_header() {
        for field in ALL_FIELDS {
            assert_eq!(field.header().parse::<CanonicalField>().unwrap(), field);
        }
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(resolve_header("Domicilio"), Some(CanonicalField::Direccion));
        assert_eq!(resolve_header("CEDULA"), Some(CanonicalField::Rut));
        assert_eq!(resolve_header("ciudad"), Some(CanonicalField::Comuna));
        assert_eq!(resolve_header("RUT"), Some(CanonicalField::Rut));
        assert_eq!(resolve_header("no_such_column"), None);
    }

    #[test]
    fn unknown_bank_is_rejected() {
        assert!("BCI".parse::<Bank>().is_err());
        assert_eq!("itaú".parse::<Bank>().unwrap(), Bank::Itau);
    }

    #[test]
    fn value_kinds_cover_the_unified_columns() {
        assert_eq!(CanonicalField::Rut.kind(), ValueKind::Identifier);
        assert_eq!(CanonicalField::MontoCredito.kind(), ValueKind::Money);
        assert_eq!(CanonicalField::Tasa.kind(), ValueKind::Rate);
        assert_eq!(CanonicalField::Cuotas.kind(), ValueKind::Integer);
        assert_eq!(CanonicalField::FechaSuscripcion.kind(), ValueKind::Date);
        assert_eq!(CanonicalField::Comuna.kind(), ValueKind::Text);
    }
}
