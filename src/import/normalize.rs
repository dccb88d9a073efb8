//! Listing normalization.
//!
//! Converts one `<immobilie>` entry into an [`ObjectData`] whose property
//! bag always carries the full, fixed column set. Missing input never
//! removes a column: strings default to `""`, integers to `0`, money to
//! `"0.00"` and flag groups to `NULL`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::NormalizeError;
use crate::import::record::{Columns, ObjectData, ResourceKind, Value};
use crate::import::serialized::encode_flags;
use crate::openimmo::model::{
    Ausstattung, Flaechen, Immobilie, Kontaktperson, Nutzungsart, Stellplatz, is_true,
};

/// Every property column a normalized record carries.
pub const PROPERTY_COLUMNS: &[&str] = &[
    "verfuegbar_ab",
    "abdatum",
    "bisdatum",
    "user",
    "nutzungsart",
    "objektart",
    "objekttyp",
    "baujahr",
    "zustand",
    "objekttitel",
    "dreizeiler",
    "objektbeschreibung",
    "lage",
    "ausstatt_beschr",
    "sonstige_angaben",
    "adresse_street",
    "adresse_city",
    "adresse_zipcode",
    "adresse_country",
    "bundesland",
    "adresse",
    "objektadresse_freigeben",
    "waehrung",
    "kaufpreis",
    "provisionspflichtig",
    "aussenprovision",
    "innenprovision",
    "nebenkosten",
    "betriebskostennetto",
    "heizkosten",
    "heizkosten_enthalten",
    "stp_freiplatz_preis",
    "stp_carport_preis",
    "stp_garage_preis",
    "wohnflaeche",
    "nutzflaeche",
    "gesamtflaeche",
    "gartenflaeche",
    "bueroflaeche",
    "ladenflaeche",
    "lagerflaeche",
    "gastroflaeche",
    "verkaufsflaeche",
    "vermietbare_flaeche",
    "anzahl_zimmer",
    "anzahl_schlafzimmer",
    "anzahl_badezimmer",
    "anzahl_balkone",
    "anzahl_terrassen",
    "anzahl_garagen",
    "stp_freiplatz",
    "stp_carport",
    "stp_garage",
    "etage",
    "anzahl_etagen",
    "kamin",
    "gartennutzung",
    "wg_geeignet",
    "raeume_veraenderbar",
    "rollstuhlgerecht",
    "klimatisiert",
    "wintergarten",
    "sauna",
    "badewanne",
    "dusche",
    "objausstattung__unterkellert",
    "kueche",
    "boden",
    "heizungsart",
    "fahrstuhl",
    "ausricht_balkon_terrasse",
    "stellplatzart",
    "moebliert",
    "anzahl_stellplaetze",
    "ausstatt_kategorie",
    "distanzen_kindergarten",
    "distanzen_grundschule",
    "distanzen_realschule",
    "distanzen_gymnasium",
    "distanzen_autobahn",
    "distanzen_bus",
    "distanzen_einkaufsmoeglichkeiten",
    "distanzen_fernbahnhof",
    "distanzen_flughafen",
    "distanzen_ubahn",
    "distanzen_zentrum",
    "energieausweis",
    "energieausweis_typ",
    "gueltig_bis",
    "energieverbrauchkennwert",
    "energieeffizienzklasse",
    "mitwarmwasser",
    "endenergiebedarf",
    "primaerenergietraeger",
    "stromwert",
    "waermewert",
];

/// Property columns that may hold `NULL`.
pub const NULLABLE_COLUMNS: &[&str] = &[
    "nutzungsart",
    "dreizeiler",
    "objektbeschreibung",
    "lage",
    "ausstatt_beschr",
    "sonstige_angaben",
    "kueche",
    "boden",
    "heizungsart",
    "fahrstuhl",
    "ausricht_balkon_terrasse",
    "stellplatzart",
];

/// Distance column → `distanz_zu` value.
const DISTANCES: &[(&str, &str)] = &[
    ("distanzen_kindergarten", "KINDERGAERTEN"),
    ("distanzen_grundschule", "GRUNDSCHULE"),
    ("distanzen_realschule", "REALSCHULE"),
    ("distanzen_gymnasium", "GYMNASIUM"),
    ("distanzen_autobahn", "AUTOBAHN"),
    ("distanzen_bus", "BUS"),
    ("distanzen_einkaufsmoeglichkeiten", "EINKAUFSMOEGLICHKEITEN"),
    ("distanzen_fernbahnhof", "FERNBAHNHOF"),
    ("distanzen_flughafen", "FLUGHAFEN"),
    ("distanzen_ubahn", "US_BAHN"),
    ("distanzen_zentrum", "ZENTRUM"),
];

const KELLER_NEIN: &str = "NEIN";

/// Normalize one listing of the given provider.
///
/// # Errors
///
/// Returns [`NormalizeError::MissingObjectId`] if the listing carries no
/// non-empty `openimmo_obid`.
pub fn normalize(provider_key: &str, immobilie: &Immobilie) -> Result<ObjectData, NormalizeError> {
    let object_id = immobilie
        .verwaltung_techn
        .as_ref()
        .and_then(|v| v.openimmo_obid.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(NormalizeError::MissingObjectId)?;

    Ok(ObjectData::new(
        provider_key,
        object_id,
        object_properties(immobilie),
        agent_data(immobilie),
        resource_data(immobilie),
    ))
}

/// Listing title for log output.
#[must_use]
pub fn listing_title(immobilie: &Immobilie) -> Option<&str> {
    immobilie
        .freitexte
        .as_ref()
        .and_then(|f| f.objekttitel.as_deref())
        .filter(|t| !t.trim().is_empty())
}

/// Column sink with one setter per target type.
struct Properties(Columns);

impl Properties {
    fn set(&mut self, column: &str, value: Value) {
        self.0.insert(column.to_string(), value);
    }

    fn text(&mut self, column: &str, value: Option<&str>) {
        self.set(column, Value::from(value.unwrap_or_default()));
    }

    fn nullable_text(&mut self, column: &str, value: Option<&str>) {
        self.set(column, Value::from(value.map(str::to_string)));
    }

    fn flag(&mut self, column: &str, state: bool) {
        self.set(column, Value::flag(state));
    }

    fn flags<const N: usize>(&mut self, column: &str, flags: [(&str, bool); N]) {
        self.set(column, Value::from(encode_flags(flags)));
    }

    fn money(&mut self, column: &str, value: Option<&str>) {
        self.set(column, Value::from(format_money(value)));
    }

    fn date(&mut self, column: &str, value: Option<&str>) {
        self.set(column, Value::from(value.map(format_date).unwrap_or_default()));
    }
}

#[allow(clippy::too_many_lines)]
fn object_properties(immobilie: &Immobilie) -> Columns {
    let mut p = Properties(Columns::new());

    let verwaltung = immobilie.verwaltung_objekt.as_ref();
    let kategorie = immobilie.objektkategorie.as_ref();
    let nutzungsart = kategorie.and_then(|k| k.nutzungsart.as_ref());
    let zustand = immobilie.zustand_angaben.as_ref();
    let freitexte = immobilie.freitexte.as_ref();
    let flaechen = immobilie.flaechen.as_ref();
    let geo = immobilie.geo.as_ref();
    let koordinaten = geo.and_then(|g| g.geokoordinaten.as_ref());
    let preise = immobilie.preise.as_ref();
    let ausstattung = immobilie.ausstattung.as_ref();
    let bad = ausstattung.and_then(|a| a.bad.as_ref());
    let kueche = ausstattung.and_then(|a| a.kueche.as_ref());
    let boden = ausstattung.and_then(|a| a.boden.as_ref());
    let heizungsart = ausstattung.and_then(|a| a.heizungsart.as_ref());
    let fahrstuhl = ausstattung.and_then(|a| a.fahrstuhl.as_ref());
    let ausrichtung = ausstattung.and_then(|a| a.ausricht_balkon_terrasse.as_ref());
    let stellplatzart = ausstattung.and_then(|a| a.stellplatzart.first());
    let energiepass = zustand.and_then(|z| z.energiepass.first());
    let stp_garage = preise.and_then(|p| p.stp_garage.as_ref());
    let stp_carport = preise.and_then(|p| p.stp_carport.as_ref());
    let stp_freiplatz = preise.and_then(|p| p.stp_freiplatz.as_ref());

    let flaeche = |get: fn(&Flaechen) -> &Option<String>| {
        flaechen.and_then(|f| get(f).as_deref())
    };
    let ausstattung_flag = |get: fn(&Ausstattung) -> &Option<String>| {
        is_true(ausstattung.and_then(|a| get(a).as_deref()))
    };

    // Publication
    p.text("verfuegbar_ab", verwaltung.and_then(|v| v.verfuegbar_ab.as_deref()));
    p.date("abdatum", verwaltung.and_then(|v| v.abdatum.as_deref()));
    p.date("bisdatum", verwaltung.and_then(|v| v.bisdatum.as_deref()));
    p.text(
        "user",
        immobilie.kontaktperson.as_ref().and_then(|k| k.email_zentrale.as_deref()),
    );

    // Category
    let usage = |get: fn(&Nutzungsart) -> &Option<String>| {
        is_true(nutzungsart.and_then(|n| get(n).as_deref()))
    };
    p.flags(
        "nutzungsart",
        [
            ("Wohnen", usage(|n| &n.wohnen)),
            ("Gewerbe", usage(|n| &n.gewerbe)),
            ("Anlage", usage(|n| &n.anlage)),
            ("WAZ", usage(|n| &n.waz)),
        ],
    );
    let (objektart, objekttyp) = object_kind(immobilie);
    p.text("objektart", Some(objektart));
    p.set("objekttyp", Value::from(objekttyp));

    // Condition
    p.set(
        "baujahr",
        Value::Integer(parse_int(zustand.and_then(|z| z.baujahr.as_deref()))),
    );
    p.text(
        "zustand",
        zustand
            .and_then(|z| z.zustand.as_ref())
            .and_then(|z| z.zustand_art.as_deref()),
    );

    // Free texts
    p.text("objekttitel", freitexte.and_then(|f| f.objekttitel.as_deref()));
    p.nullable_text("dreizeiler", freitexte.and_then(|f| f.dreizeiler.as_deref()));
    p.nullable_text(
        "objektbeschreibung",
        freitexte.and_then(|f| f.objektbeschreibung.as_deref()),
    );
    p.nullable_text("lage", freitexte.and_then(|f| f.lage.as_deref()));
    p.nullable_text(
        "ausstatt_beschr",
        freitexte.and_then(|f| f.ausstatt_beschr.as_deref()),
    );
    p.nullable_text(
        "sonstige_angaben",
        freitexte.and_then(|f| f.sonstige_angaben.as_deref()),
    );

    // Geo
    let street = format!(
        "{} {}",
        geo.and_then(|g| g.strasse.as_deref()).unwrap_or_default(),
        geo.and_then(|g| g.hausnummer.as_deref()).unwrap_or_default()
    );
    p.text("adresse_street", Some(street.trim()));
    p.text("adresse_city", geo.and_then(|g| g.ort.as_deref()));
    p.text("adresse_zipcode", geo.and_then(|g| g.plz.as_deref()));
    p.text(
        "adresse_country",
        geo.and_then(|g| g.land.as_ref()).and_then(|l| l.iso_land.as_deref()),
    );
    p.text("bundesland", geo.and_then(|g| g.bundesland.as_deref()));
    let coordinates = match (
        koordinaten.and_then(|k| k.breitengrad.as_deref()),
        koordinaten.and_then(|k| k.laengengrad.as_deref()),
    ) {
        (Some(lat), Some(lon)) => format!("{},{}", lat.trim(), lon.trim()),
        _ => String::new(),
    };
    p.set("adresse", Value::from(coordinates));
    p.flag(
        "objektadresse_freigeben",
        is_true(verwaltung.and_then(|v| v.objektadresse_freigeben.as_deref())),
    );

    // Prices and costs
    p.text(
        "waehrung",
        preise
            .and_then(|p| p.waehrung.as_ref())
            .and_then(|w| w.iso_waehrung.as_deref()),
    );
    p.money(
        "kaufpreis",
        preise.and_then(|p| p.kaufpreis.as_ref()).and_then(|k| k.text()),
    );
    p.flag(
        "provisionspflichtig",
        is_true(preise.and_then(|p| p.provisionspflichtig.as_deref())),
    );
    p.text(
        "aussenprovision",
        preise.and_then(|p| p.aussen_courtage.as_ref()).and_then(|c| c.text()),
    );
    p.text(
        "innenprovision",
        preise.and_then(|p| p.innen_courtage.as_ref()).and_then(|c| c.text()),
    );
    p.text("nebenkosten", preise.and_then(|p| p.nebenkosten.as_deref()));
    p.text(
        "betriebskostennetto",
        preise
            .and_then(|p| p.betriebskostennetto.as_ref())
            .and_then(|b| b.text()),
    );
    p.text("heizkosten", preise.and_then(|p| p.heizkosten.as_deref()));
    p.flag(
        "heizkosten_enthalten",
        is_true(preise.and_then(|p| p.heizkosten_enthalten.as_deref())),
    );
    p.money("stp_freiplatz_preis", parking_price(stp_freiplatz));
    p.money("stp_carport_preis", parking_price(stp_carport));
    p.money("stp_garage_preis", parking_price(stp_garage));

    // Areas
    p.text("wohnflaeche", flaeche(|f| &f.wohnflaeche));
    p.text("nutzflaeche", flaeche(|f| &f.nutzflaeche));
    p.text("gesamtflaeche", flaeche(|f| &f.gesamtflaeche));
    p.text("gartenflaeche", flaeche(|f| &f.gartenflaeche));
    p.text("bueroflaeche", flaeche(|f| &f.bueroflaeche));
    p.text("ladenflaeche", flaeche(|f| &f.ladenflaeche));
    p.text("lagerflaeche", flaeche(|f| &f.lagerflaeche));
    p.text("gastroflaeche", flaeche(|f| &f.gastroflaeche));
    p.text("verkaufsflaeche", flaeche(|f| &f.verkaufsflaeche));
    p.text("vermietbare_flaeche", flaeche(|f| &f.vermietbare_flaeche));

    // Rooms
    p.text("anzahl_zimmer", flaeche(|f| &f.anzahl_zimmer));
    p.text("anzahl_schlafzimmer", flaeche(|f| &f.anzahl_schlafzimmer));
    p.text("anzahl_badezimmer", flaeche(|f| &f.anzahl_badezimmer));
    p.text("anzahl_balkone", flaeche(|f| &f.anzahl_balkone));
    p.text("anzahl_terrassen", flaeche(|f| &f.anzahl_terrassen));

    // Parking
    p.text("anzahl_garagen", stp_garage.and_then(|s| s.anzahl.as_deref()));
    p.flag("stp_freiplatz", parking_count(stp_freiplatz) > 0);
    p.flag("stp_carport", parking_count(stp_carport) > 0);
    p.flag("stp_garage", parking_count(stp_garage) > 0);

    // Floors
    p.text("etage", geo.and_then(|g| g.etage.as_deref()));
    p.text("anzahl_etagen", geo.and_then(|g| g.anzahl_etagen.as_deref()));

    // Equipment
    p.flag("kamin", ausstattung_flag(|a| &a.kamin));
    p.flag("gartennutzung", ausstattung_flag(|a| &a.gartennutzung));
    p.flag("wg_geeignet", ausstattung_flag(|a| &a.wg_geeignet));
    p.flag("raeume_veraenderbar", ausstattung_flag(|a| &a.raeume_veraenderbar));
    p.flag("rollstuhlgerecht", ausstattung_flag(|a| &a.rollstuhlgerecht));
    p.flag("klimatisiert", ausstattung_flag(|a| &a.klimatisiert));
    p.flag("wintergarten", ausstattung_flag(|a| &a.wintergarten));
    p.flag("sauna", ausstattung_flag(|a| &a.sauna));
    p.flag("badewanne", is_true(bad.and_then(|b| b.wanne.as_deref())));
    p.flag("dusche", is_true(bad.and_then(|b| b.dusche.as_deref())));
    let keller = ausstattung
        .and_then(|a| a.unterkellert.as_ref())
        .and_then(|u| u.keller.as_deref())
        .map(str::trim);
    p.flag("objausstattung__unterkellert", keller != Some(KELLER_NEIN));

    // Equipment flag groups
    let set = |value: Option<&Option<String>>| is_true(value.and_then(Option::as_deref));
    p.flags(
        "kueche",
        [
            ("OFFEN", set(kueche.map(|k| &k.offen))),
            ("EBK", set(kueche.map(|k| &k.ebk))),
            ("PANTRY", set(kueche.map(|k| &k.pantry))),
        ],
    );
    p.flags(
        "boden",
        [
            ("Dielen", set(boden.map(|b| &b.dielen))),
            ("Doppelboden", set(boden.map(|b| &b.doppelboden))),
            ("Estrich", set(boden.map(|b| &b.estrich))),
            ("Fertigparkett", set(boden.map(|b| &b.fertigparkett))),
            ("Fliesen", set(boden.map(|b| &b.fliesen))),
            ("Granit", set(boden.map(|b| &b.granit))),
            ("Kunststoff", set(boden.map(|b| &b.kunststoff))),
            ("Laminat", set(boden.map(|b| &b.laminat))),
            ("Linoleum", set(boden.map(|b| &b.linoleum))),
            ("Marmor", set(boden.map(|b| &b.marmor))),
            ("Parkett", set(boden.map(|b| &b.parkett))),
            ("Stein", set(boden.map(|b| &b.stein))),
            ("Teppich", set(boden.map(|b| &b.teppich))),
            ("Terrakotta", set(boden.map(|b| &b.terrakotta))),
        ],
    );
    p.flags(
        "heizungsart",
        [
            ("Etage", set(heizungsart.map(|h| &h.etage))),
            ("Fern", set(heizungsart.map(|h| &h.fern))),
            ("Fussboden", set(heizungsart.map(|h| &h.fussboden))),
            ("Ofen", set(heizungsart.map(|h| &h.ofen))),
            ("Zentral", set(heizungsart.map(|h| &h.zentral))),
        ],
    );
    p.flags(
        "fahrstuhl",
        [
            ("lasten", set(fahrstuhl.map(|f| &f.lasten))),
            ("personen", set(fahrstuhl.map(|f| &f.personen))),
        ],
    );
    p.flags(
        "ausricht_balkon_terrasse",
        [
            ("nord", set(ausrichtung.map(|a| &a.nord))),
            ("ost", set(ausrichtung.map(|a| &a.ost))),
            ("sued", set(ausrichtung.map(|a| &a.sued))),
            ("west", set(ausrichtung.map(|a| &a.west))),
            ("nordost", set(ausrichtung.map(|a| &a.nordost))),
            ("nordwest", set(ausrichtung.map(|a| &a.nordwest))),
            ("suedost", set(ausrichtung.map(|a| &a.suedost))),
            ("suedwest", set(ausrichtung.map(|a| &a.suedwest))),
        ],
    );
    p.flags(
        "stellplatzart",
        [
            ("Garage", set(stellplatzart.map(|s| &s.garage))),
            ("Tiefgarage", set(stellplatzart.map(|s| &s.tiefgarage))),
            ("Carport", set(stellplatzart.map(|s| &s.carport))),
            ("Freiplatz", set(stellplatzart.map(|s| &s.freiplatz))),
            ("Parkhaus", set(stellplatzart.map(|s| &s.parkhaus))),
            ("Duplex", set(stellplatzart.map(|s| &s.duplex))),
        ],
    );

    p.text(
        "moebliert",
        ausstattung
            .and_then(|a| a.moebliert.as_ref())
            .and_then(|m| m.moeb.as_deref()),
    );
    p.text("anzahl_stellplaetze", flaeche(|f| &f.anzahl_stellplaetze));
    p.text(
        "ausstatt_kategorie",
        ausstattung.and_then(|a| a.ausstatt_kategorie.as_deref()),
    );

    // Distances; a repeated target keeps the last value.
    let distances: HashMap<&str, &str> = immobilie
        .infrastruktur
        .iter()
        .flat_map(|i| &i.distanzen)
        .filter_map(|d| Some((d.distanz_zu.as_deref()?.trim(), d.value.as_deref()?.trim())))
        .collect();
    for (column, target) in DISTANCES {
        p.text(column, distances.get(target).copied());
    }

    // Energy certificate
    p.flag("energieausweis", energiepass.is_some());
    p.text("energieausweis_typ", energiepass.and_then(|e| e.epart.as_deref()));
    p.date("gueltig_bis", energiepass.and_then(|e| e.gueltig_bis.as_deref()));
    p.text(
        "energieverbrauchkennwert",
        energiepass.and_then(|e| e.energieverbrauchkennwert.as_deref()),
    );
    p.text(
        "energieeffizienzklasse",
        energiepass.and_then(|e| e.wertklasse.as_deref()),
    );
    p.flag(
        "mitwarmwasser",
        is_true(energiepass.and_then(|e| e.mitwarmwasser.as_deref())),
    );
    p.text(
        "endenergiebedarf",
        energiepass.and_then(|e| e.endenergiebedarf.as_deref()),
    );
    p.text(
        "primaerenergietraeger",
        energiepass.and_then(|e| e.primaerenergietraeger.as_deref()),
    );
    p.text("stromwert", energiepass.and_then(|e| e.stromwert.as_deref()));
    p.text("waermewert", energiepass.and_then(|e| e.waermewert.as_deref()));

    p.0
}

/// First present object kind and its capitalised sub-type.
fn object_kind(immobilie: &Immobilie) -> (&'static str, String) {
    let Some(art) = immobilie
        .objektkategorie
        .as_ref()
        .and_then(|k| k.objektart.as_ref())
    else {
        return ("", String::new());
    };

    let kinds: [(&'static str, Option<&str>); 7] = [
        ("Haus", art.haus.first().and_then(|t| t.value.as_deref())),
        ("Wohnung", art.wohnung.first().and_then(|t| t.value.as_deref())),
        ("Grundstück", art.grundstueck.first().and_then(|t| t.value.as_deref())),
        ("Zimmer", art.zimmer.first().and_then(|t| t.value.as_deref())),
        ("Büro/Praxen", art.buero_praxen.first().and_then(|t| t.value.as_deref())),
        (
            "Laden/Einzelhandel",
            art.einzelhandel.first().and_then(|t| t.value.as_deref()),
        ),
        ("Sonstige", art.sonstige.first().and_then(|t| t.value.as_deref())),
    ];

    kinds
        .into_iter()
        .find_map(|(kind, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (kind, capitalize(v)))
        })
        .unwrap_or(("", String::new()))
}

fn agent_data(immobilie: &Immobilie) -> Columns {
    let kontakt = immobilie.kontaktperson.as_ref();
    let field = |get: fn(&Kontaktperson) -> &Option<String>| {
        Value::from(kontakt.and_then(|k| get(k).as_deref()).unwrap_or_default())
    };

    Columns::from([
        ("external_id".to_string(), field(|k| &k.personennummer)),
        ("anrede".to_string(), field(|k| &k.anrede)),
        ("firstname".to_string(), field(|k| &k.vorname)),
        ("lastname".to_string(), field(|k| &k.name)),
        ("email_direkt".to_string(), field(|k| &k.email_direkt)),
        ("tel_durchwahl".to_string(), field(|k| &k.tel_durchw)),
    ])
}

fn resource_data(immobilie: &Immobilie) -> Vec<(String, ResourceKind)> {
    immobilie
        .anhaenge
        .iter()
        .flat_map(|a| &a.anhang)
        .filter_map(|anhang| {
            let path = anhang
                .daten
                .as_ref()?
                .pfad
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())?;
            Some((
                path.to_string(),
                ResourceKind::from_group(anhang.gruppe.as_deref()),
            ))
        })
        .collect()
}

fn parking_price(stellplatz: Option<&Stellplatz>) -> Option<&str> {
    stellplatz.and_then(|s| {
        s.stellplatzkaufpreis
            .as_deref()
            .or(s.stellplatzmiete.as_deref())
    })
}

fn parking_count(stellplatz: Option<&Stellplatz>) -> i64 {
    parse_int(stellplatz.and_then(|s| s.anzahl.as_deref()))
}

/// Two decimals, `.` separator, `0.00` when absent or unparseable.
///
/// Halves round away from zero on the shortest decimal form of the amount,
/// so `1.005` becomes `1.01` even though the nearest `f64` lies below it.
fn format_money(value: Option<&str>) -> String {
    let amount = value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    // `f64` display never uses an exponent.
    let shortest = amount.abs().to_string();
    let (whole, fraction) = shortest
        .split_once('.')
        .unwrap_or((shortest.as_str(), ""));

    let mut digits: Vec<u8> = whole
        .bytes()
        .chain(fraction.bytes().chain(std::iter::repeat(b'0')).take(2))
        .map(|b| b - b'0')
        .collect();

    if fraction.as_bytes().get(2).is_some_and(|&d| d >= b'5') {
        increment(&mut digits);
    }

    let sign = if amount < 0.0 && digits.iter().any(|&d| d != 0) {
        "-"
    } else {
        ""
    };
    let render = |part: &[u8]| part.iter().map(|&d| char::from(b'0' + d)).collect::<String>();
    let (units, cents) = digits.split_at(digits.len() - 2);

    format!("{sign}{}.{}", render(units), render(cents))
}

/// Add one to a big-endian decimal digit string.
fn increment(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, 1);
}

/// `DD.MM.YYYY`, or an empty string if the input is not a recognizable date.
fn format_date(value: &str) -> String {
    let value = value.trim();

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
        .or_else(|| NaiveDate::parse_from_str(value, "%d.%m.%Y").ok());

    date.map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_default()
}

/// Leading integer of a string, `0` if there is none.
fn parse_int(value: Option<&str>) -> i64 {
    let Some(value) = value.map(str::trim) else {
        return 0;
    };

    let digits_end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);

    value[..digits_end].parse().unwrap_or(0)
}

fn capitalize(value: &str) -> String {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
