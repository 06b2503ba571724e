//! Builtin extraction patterns for the known banks.
//!
//! Each table entry is (field, pattern, capture group, priority), optionally
//! with a window regex that must not match around the hit. Priorities encode
//! how label-specific a pattern is: labelled identity-block captures beat
//! loose document-wide scans.

use std::collections::HashMap;

use crate::config::{FieldPattern, PatternSet};
use crate::schema::{Bank, CanonicalField};

/// Window text that disqualifies a RUT-shaped number: bank headers and
/// operation/product labels produce digit runs that are not the debtor's RUT.
const RUT_EXCLUDE: &str = r"(?i)Operaci[oó]n|Producto|\bBanco\b|Ita[uú]|Santander|Representado\s+por|97\.?023\.?000";

fn add(set: &mut PatternSet, field: CanonicalField, pattern: &str, group: usize, priority: i32) {
    set.insert(field, FieldPattern::new(field, pattern, group, priority).unwrap());
}

fn add_excl(
    set: &mut PatternSet,
    field: CanonicalField,
    pattern: &str,
    group: usize,
    priority: i32,
    exclude: &str,
) {
    set.insert(
        field,
        FieldPattern::new(field, pattern, group, priority)
            .unwrap()
            .with_exclude(field, exclude)
            .unwrap(),
    );
}

pub fn builtin_sets() -> HashMap<Bank, PatternSet> {
    let mut sets = HashMap::new();
    sets.insert(Bank::Itau, itau());
    sets.insert(Bank::Santander, santander());
    sets.insert(Bank::Indisa, indisa());
    sets
}

/// Patterns shared by every bank: RUT/DV capture ladders, date phrasings,
/// amounts and installment tables as they appear in pagarés and consumer
/// credit contracts.
fn common(set: &mut PatternSet) {
    use CanonicalField::*;

    // Operation number. "N°" often degrades to "N*" or "N?" in OCR.
    add(set, Operacion, r"(?i)N[°º*?]?\s*Operaci[oó]n[:\s]*([0-9]{6,})", 1, 3);
    add(set, Operacion, r"(?i)\bOperaci[oó]n\s*N[°º*?]?\s*[:\s]*([0-9]{6,})", 1, 3);
    add(set, Operacion, r"(?i)N[°º*?]?\s*Producto[:\s]*([0-9]{6,})", 1, 2);
    add(set, Operacion, r"(?i)\bProducto\s*N[°º*?]?\s*[:\s]*([0-9]{6,})", 1, 2);

    // RUT ladder, most label-specific first. The same regexes feed DV from
    // their second capture group.
    let rut_labelled: &[(&str, i32)] = &[
        (
            r"(?i)C\.?\s*[LI]\s*[/\\]\s*RUT\s*N?[°º*]?\s*[:\s]+([\d.,]{6,})\s*[-–—]?\s*([0-9Kk])\b",
            20,
        ),
        (
            r"(?i)C[eé]dula\s+de\s+Identidad\s*N?[°º*]?\s*:?\s*([\d.,]{6,})\s*[-–—]?\s*([0-9Kk])\b",
            12,
        ),
        (
            r"(?i)\bRUT\b[^:\d\n]{0,10}[:\s]*([\d.,]{6,})\s*[-–—]?\s*([0-9Kk])\b",
            10,
        ),
    ];
    for (pattern, priority) in rut_labelled {
        add(set, Rut, pattern, 1, *priority);
        add(set, Dv, pattern, 2, *priority);
    }
    // Unlabelled dotted and plain forms, disqualified near bank headers.
    let rut_generic: &[(&str, i32)] = &[
        (r"([0-9]{1,3}(?:\.[0-9]{3}){1,2})\s*[-\s–—]*([0-9Kk])\b", 3),
        (r"\b(\d{7,8})\s*[-\s–—]*([0-9Kk])\b", 2),
    ];
    for (pattern, priority) in rut_generic {
        add_excl(set, Rut, pattern, 1, *priority, RUT_EXCLUDE);
        add_excl(set, Dv, pattern, 2, *priority, RUT_EXCLUDE);
    }

    // Debtor name from identity-block labels.
    add(
        set,
        Nombre,
        r"(?im)^\s*Nombre\s+y\s+Apellidos\s+del\s+deudor\s*[:\s]+(.+)$",
        1,
        15,
    );
    add_excl(
        set,
        Nombre,
        r"(?im)^\s*(?:Suscriptor(?:\s+o\s+Deudor)?|Deudor|Cliente/Deudor)\s*[:.\s-]+(.+)$",
        1,
        10,
        r"(?i)\bBanco\b|S\.A",
    );
    add_excl(
        set,
        Nombre,
        r"(?im)^\s*(?:Se[ñn]ora?|Sra?\.?)\s*[:.\s-]+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑa-záéíóúñ ]{3,60})$",
        1,
        5,
        r"(?i)\bBanco\b|S\.A",
    );

    // Address. The "Domicilio y competencia" clause is boilerplate, not the
    // debtor's street.
    add_excl(
        set,
        Direccion,
        r"(?im)^\s*Domicilio\s*[:.\- ]+([^,\n]{6,})(?:,|$)",
        1,
        15,
        r"(?i)y\s+competencia|efectos\s+legales|EN\s+SU\s+OFICINA|PRESIDENTE\s+RIESCO",
    );
    add(
        set,
        Direccion,
        r"(?im)^\s*Direcci[oó]n(?:\s+Informativa)?\s*[:.\- ]+([^,\n]{6,})(?:,|$)",
        1,
        12,
    );
    add(
        set,
        Direccion,
        r"(?i)(?:domiciliad[oa]\s+en|con\s+domicilio\s+en)\s+([^\n\r,]{6,})",
        1,
        8,
    );

    // Comuna: explicit label, "comuna de X" phrasing, or the tail after the
    // address comma.
    add(
        set,
        Comuna,
        r"(?im)^\s*Comuna\s*[:.\- ]+([A-ZÁÉÍÓÚÑa-záéíóúñ ]{3,30})\s*$",
        1,
        15,
    );
    add(
        set,
        Comuna,
        r"(?i)\bcomuna\s+de\s+([A-ZÁÉÍÓÚÑa-záéíóúñ]+(?:\s+[A-ZÁÉÍÓÚÑa-záéíóúñ]+){0,2})",
        1,
        10,
    );
    add(
        set,
        Comuna,
        r"(?im)^\s*(?:Domicilio|Direcci[oó]n(?:\s+Informativa)?)\s*[:.\- ]+[^,\n]{6,},\s*([A-ZÁÉÍÓÚÑa-záéíóúñ ]{3,30})\s*$",
        1,
        12,
    );

    // Subscription date: long Spanish phrasings outrank bare numeric dates.
    add(
        set,
        FechaSuscripcion,
        r"(?i)\ba\s+(\d{1,2}\s+de\s+[A-Za-záéíóúñÑ]+\s+de\s+\d{4})",
        1,
        10,
    );
    add(
        set,
        FechaSuscripcion,
        r"(?i)\bel\s+d[ií]a\s+(\d{1,2}\s+de\s+[A-Za-záéíóúñÑ]+\s+de\s+\d{4})",
        1,
        9,
    );
    add(
        set,
        FechaSuscripcion,
        r"(?i)[A-Za-zÁÉÍÓÚÑáéíóúñ]+,\s*(\d{1,2}\s+de\s+[A-Za-záéíóúñÑ]+\s+de\s+\d{4})",
        1,
        8,
    );
    add(
        set,
        FechaSuscripcion,
        r"(?i)\b(\d{1,2}\s+de\s+[A-Za-záéíóúñÑ]+\s+de\s+\d{4})\b",
        1,
        6,
    );
    add(
        set,
        FechaSuscripcion,
        r"\b(\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4})\b",
        1,
        5,
    );

    // Credit amount: "la suma de $..." is the contract's operative clause.
    add(
        set,
        MontoCredito,
        r"(?i)(?:la\s+suma\s+de|cantidad\s+de)\s*\$?\s*([0-9][0-9.,]{3,})",
        1,
        10,
    );
    add(
        set,
        MontoCredito,
        r"(?i)(?:monto|cr[eé]dito)(?:\s+de)?\s*:?\s*\$\s*([0-9]{1,3}(?:\.[0-9]{3})+)",
        1,
        7,
    );
    add(set, MontoCredito, r"\$\s*([0-9]{1,3}(?:\.[0-9]{3})+)", 1, 5);

    // Installments.
    add(set, Cuotas, r"(?i)\ben\s+(\d{1,3})\s+cuotas\b", 1, 10);
    add(set, Cuotas, r"(?i)\b(\d{1,3})\s+cuotas\s+iguales", 1, 8);
    add(set, Cuotas, r"(?i)\bdividido\s+en\s+(\d{1,3})\b", 1, 5);

    add(
        set,
        Tasa,
        r"(?i)tasa(?:\s+de)?\s+inter[eé]s[^0-9%\n]{0,20}([0-9]{1,2}[.,][0-9]{1,2})\s*%",
        1,
        10,
    );
    add(set, Tasa, r"([0-9]{1,2}[.,][0-9]{1,2})\s*%", 1, 5);

    add(
        set,
        MontoCuota,
        r"(?i)cuotas?\s+(?:iguales\s+)?de\s*\$\s*([0-9][0-9.]{2,})",
        1,
        10,
    );
    add(
        set,
        MontoCuota,
        r"(?i)([0-9]{1,3}(?:\.[0-9]{3})+)\s+cada\s+(?:mes|cuota)",
        1,
        5,
    );
    add(
        set,
        MontoUltimaCuota,
        r"(?i)(?:una\s+)?[uú]ltima\s+(?:cuota\s+)?(?:de\s+)?\$\s*([0-9][0-9.]{2,})",
        1,
        10,
    );

    // Due dates of first and last installments.
    add(
        set,
        FechaVencimientoPrimeraCuota,
        r"(?i)(?:venciendo\s+la\s+)?primera\s+cuota\s+el\s+d[ií]a\s+(\d{1,2}\s+de\s+[a-záéíóúñ]+\s+de\s+\d{4})",
        1,
        15,
    );
    add(
        set,
        FechaVencimientoPrimeraCuota,
        r"(?i)primera\s+cuota[^0-9\n]{0,30}([0-3]?\d[/\-.][0-1]?\d[/\-.](?:20)?\d{2})",
        1,
        10,
    );
    add(
        set,
        FechaVencimientoPrimeraCuota,
        r"(?i)(?:a\s+)?contar\s+del\s+([0-3]?\d[/\-.][0-1]?\d[/\-.](?:20)?\d{2})",
        1,
        8,
    );
    add(
        set,
        FechaVencimientoUltimaCuota,
        r"(?i)la\s+[uú]ltima\s+el\s+(?:d[ií]a\s+)?(\d{1,2}\s+de\s+[a-záéíóúñ]+\s+de\s+\d{4})",
        1,
        15,
    );
    add(
        set,
        FechaVencimientoUltimaCuota,
        r"(?i)[uú]ltima\s+cuota\s+el\s+d[ií]a\s+(\d{1,2}\s+de\s+[a-záéíóúñ]+\s+de\s+\d{4})",
        1,
        14,
    );
    add(
        set,
        FechaVencimientoUltimaCuota,
        r"(?i)[uú]ltima[^0-9\n]{0,30}([0-3]?\d[/\-.][0-1]?\d[/\-.](?:20)?\d{2})",
        1,
        8,
    );

    // Arrears.
    add(
        set,
        CuotaMorosa,
        r"(?i)cuota\s+morosa\s*(?:n[°º]?\s*)?[:\- ]*(\d{1,3})\b",
        1,
        5,
    );
    add(
        set,
        FechaCuotaMorosa,
        r"(?i)cuota\s+morosa[^0-9\n]{0,40}([0-3]?\d[/\-.][0-1]?\d[/\-.](?:20)?\d{2,4})",
        1,
        5,
    );

    add(
        set,
        Capital,
        r"(?i)capital\s+(?:insoluto\s+)?(?:de\s+)?\$?\s*([0-9][0-9.]{3,})",
        1,
        8,
    );
    add(
        set,
        Capital,
        r"(?i)saldo\s+de\s+capital[^0-9$\n]{0,20}\$?\s*([0-9][0-9.]{3,})",
        1,
        6,
    );

    add(
        set,
        Exhorto,
        r"(?i)(?:exhorto|tribunal|juzgado)\s*(?:de\s+letras\s+de\s+)?[:\- ]+([A-ZÁÉÍÓÚÑa-záéíóúñ ]{3,40})",
        1,
        5,
    );
    add(
        set,
        Sucursal,
        r"(?i)(?:sucursal|oficina|agencia)\s*[:\- ]+([A-ZÁÉÍÓÚÑa-záéíóúñ ]{3,40})",
        1,
        5,
    );

    // Product hint, e.g. "Producto: TC". Document-type detection fills the
    // field when no hint is printed.
    add(set, Producto, r"(?i)\bProducto\s*[:\-]\s*([A-Z]{2,4})\b", 1, 10);

    // Attorneys-in-fact.
    add(
        set,
        NombreApoderado,
        r"(?i)Representante\s*1\s*[:.\s-]+([^\n]{4,60})",
        1,
        10,
    );
    add(
        set,
        NombreApoderado,
        r"(?i)\bapoderado\s*[:\-]\s*([^,\n]{4,60})",
        1,
        5,
    );
    add(
        set,
        NombreApoderado,
        r"(?i)en\s+representaci[oó]n\s+de\s+([^,\n]{4,60})",
        1,
        4,
    );
    add(
        set,
        NombreApoderado2,
        r"(?i)Representante\s*2\s*[:.\s-]+([^\n]{4,60})",
        1,
        10,
    );
}

fn itau() -> PatternSet {
    use CanonicalField::*;
    let mut set = PatternSet::default();
    common(&mut set);
    // Itaú pagarés label the identity line "C.I/RUT N°:"; OCR renders the
    // degraded "C.L/RUT N*:" variant just as often.
    add(
        &mut set,
        Rut,
        r"(?i)C\s*\.\s*[LI]\s*[/\\]\s*RUT\s+N[°º*?]?\s*[:\s]+([\d.,]{6,})\s*[-–—]?\s*([0-9Kk])\b",
        1,
        19,
    );
    add(
        &mut set,
        Dv,
        r"(?i)C\s*\.\s*[LI]\s*[/\\]\s*RUT\s+N[°º*?]?\s*[:\s]+([\d.,]{6,})\s*[-–—]?\s*([0-9Kk])\b",
        2,
        19,
    );
    add(
        &mut set,
        Direccion,
        r"(?im)^\s*Direcci[oó]n\s+Informativa\s*[:]\s*([^,\n]{6,})(?:,|$)",
        1,
        14,
    );
    set
}

fn santander() -> PatternSet {
    use CanonicalField::*;
    let mut set = PatternSet::default();
    common(&mut set);
    add(
        &mut set,
        Nombre,
        r"(?im)^\s*Nombre\s+Deudor\s*[:\- ]+(.+)$",
        1,
        14,
    );
    // Santander pagarés run the debtor line right above the RUT line.
    add_excl(
        &mut set,
        Nombre,
        r"(?im)^([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ ]{7,60})\n[^\n]*\bRUT\b",
        1,
        6,
        r"(?i)\bBanco\b|Santander|Chile|S\.A|Pagar[eé]|Cr[eé]dito",
    );
    set
}

fn indisa() -> PatternSet {
    use CanonicalField::*;
    let mut set = PatternSet::default();
    common(&mut set);
    // Cheques carry a bare labelled amount more often than contract prose.
    add(
        &mut set,
        MontoCredito,
        r"(?i)\bMONTO\s*[:\-]?\s*\$?\s*([0-9][0-9.]{2,})",
        1,
        9,
    );
    add(
        &mut set,
        Rut,
        r"(?i)\bRUT\b[^\d\n]{0,10}[:\sNnoº°]*([\d.]{6,})\s*[-–—]?\s*([0-9Kk])\b",
        1,
        11,
    );
    add(
        &mut set,
        Dv,
        r"(?i)\bRUT\b[^\d\n]{0,10}[:\sNnoº°]*([\d.]{6,})\s*[-–—]?\s*([0-9Kk])\b",
        2,
        11,
    );
    set
}
