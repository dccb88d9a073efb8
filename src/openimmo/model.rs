//! Typed OpenImmo document tree.
//!
//! Only the parts of the exchange format the importer reads are modelled.
//! Every leaf is kept as its raw text (`Option<String>`) so a single odd
//! value never fails the whole document; conversion to integers, money and
//! dates happens during normalization. Attributes use quick-xml's `@name`
//! convention, element text with attributes uses `$text`. Repeated elements
//! collect into a `Vec` even when other elements sit between them.

use serde::Deserialize;

/// Document root (`<openimmo>`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenImmo {
    pub uebertragung: Option<Uebertragung>,
    #[serde(default)]
    pub anbieter: Vec<Anbieter>,
}

/// Transfer envelope (`<uebertragung>`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Uebertragung {
    #[serde(rename = "@art")]
    pub art: Option<String>,
    #[serde(rename = "@umfang")]
    pub umfang: Option<String>,
    #[serde(rename = "@modus")]
    pub modus: Option<String>,
    #[serde(rename = "@version")]
    pub version: Option<String>,
    #[serde(rename = "@sendersoftware")]
    pub sendersoftware: Option<String>,
    #[serde(rename = "@senderversion")]
    pub senderversion: Option<String>,
}

/// One provider and its listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Anbieter {
    pub anbieternr: Option<String>,
    pub firma: Option<String>,
    pub openimmo_anid: Option<String>,
    #[serde(default)]
    pub immobilie: Vec<Immobilie>,
}

/// One listing entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Immobilie {
    pub objektkategorie: Option<Objektkategorie>,
    pub geo: Option<Geo>,
    pub kontaktperson: Option<Kontaktperson>,
    pub preise: Option<Preise>,
    pub flaechen: Option<Flaechen>,
    pub ausstattung: Option<Ausstattung>,
    pub zustand_angaben: Option<ZustandAngaben>,
    pub infrastruktur: Option<Infrastruktur>,
    pub freitexte: Option<Freitexte>,
    pub anhaenge: Option<Anhaenge>,
    pub verwaltung_objekt: Option<VerwaltungObjekt>,
    pub verwaltung_techn: Option<VerwaltungTechn>,
}

/// Element carrying a text value plus attributes we ignore.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextValue {
    #[serde(rename = "$text")]
    pub value: Option<String>,
}

impl TextValue {
    pub fn text(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

// ── Category ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Objektkategorie {
    pub nutzungsart: Option<Nutzungsart>,
    pub objektart: Option<Objektart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Nutzungsart {
    #[serde(rename = "@WOHNEN")]
    pub wohnen: Option<String>,
    #[serde(rename = "@GEWERBE")]
    pub gewerbe: Option<String>,
    #[serde(rename = "@ANLAGE")]
    pub anlage: Option<String>,
    #[serde(rename = "@WAZ")]
    pub waz: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Objektart {
    #[serde(default)]
    pub haus: Vec<HausTyp>,
    #[serde(default)]
    pub wohnung: Vec<WohnungTyp>,
    #[serde(default)]
    pub grundstueck: Vec<GrundstTyp>,
    #[serde(default)]
    pub zimmer: Vec<ZimmerTyp>,
    #[serde(default)]
    pub buero_praxen: Vec<BueroTyp>,
    #[serde(default)]
    pub einzelhandel: Vec<HandelTyp>,
    #[serde(default)]
    pub sonstige: Vec<SonstigeTyp>,
}

/// Object kind elements carry their sub-type in a kind-specific attribute.
macro_rules! kind_attribute {
    ($name:ident, $attr:literal) => {
        #[derive(Debug, Clone, Default, Deserialize)]
        pub struct $name {
            #[serde(rename = $attr)]
            pub value: Option<String>,
        }
    };
}

kind_attribute!(HausTyp, "@haustyp");
kind_attribute!(WohnungTyp, "@wohnungtyp");
kind_attribute!(GrundstTyp, "@grundst_typ");
kind_attribute!(ZimmerTyp, "@zimmertyp");
kind_attribute!(BueroTyp, "@buero_typ");
kind_attribute!(HandelTyp, "@handel_typ");
kind_attribute!(SonstigeTyp, "@sonstige_typ");

// ── Geo ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geo {
    pub plz: Option<String>,
    pub ort: Option<String>,
    pub geokoordinaten: Option<Geokoordinaten>,
    pub strasse: Option<String>,
    pub hausnummer: Option<String>,
    pub bundesland: Option<String>,
    pub land: Option<Land>,
    pub etage: Option<String>,
    pub anzahl_etagen: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geokoordinaten {
    #[serde(rename = "@breitengrad")]
    pub breitengrad: Option<String>,
    #[serde(rename = "@laengengrad")]
    pub laengengrad: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Land {
    #[serde(rename = "@iso_land")]
    pub iso_land: Option<String>,
}

// ── Contact ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Kontaktperson {
    pub email_zentrale: Option<String>,
    pub email_direkt: Option<String>,
    pub tel_durchw: Option<String>,
    pub name: Option<String>,
    pub vorname: Option<String>,
    pub anrede: Option<String>,
    pub personennummer: Option<String>,
}

// ── Pricing ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preise {
    pub kaufpreis: Option<TextValue>,
    pub nebenkosten: Option<String>,
    pub heizkosten: Option<String>,
    pub heizkosten_enthalten: Option<String>,
    pub provisionspflichtig: Option<String>,
    pub aussen_courtage: Option<TextValue>,
    pub innen_courtage: Option<TextValue>,
    pub betriebskostennetto: Option<TextValue>,
    pub waehrung: Option<Waehrung>,
    pub stp_garage: Option<Stellplatz>,
    pub stp_carport: Option<Stellplatz>,
    pub stp_freiplatz: Option<Stellplatz>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Waehrung {
    #[serde(rename = "@iso_waehrung")]
    pub iso_waehrung: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stellplatz {
    #[serde(rename = "@stellplatzmiete")]
    pub stellplatzmiete: Option<String>,
    #[serde(rename = "@stellplatzkaufpreis")]
    pub stellplatzkaufpreis: Option<String>,
    #[serde(rename = "@anzahl")]
    pub anzahl: Option<String>,
}

// ── Areas ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Flaechen {
    pub wohnflaeche: Option<String>,
    pub nutzflaeche: Option<String>,
    pub gesamtflaeche: Option<String>,
    pub ladenflaeche: Option<String>,
    pub lagerflaeche: Option<String>,
    pub verkaufsflaeche: Option<String>,
    pub bueroflaeche: Option<String>,
    pub gastroflaeche: Option<String>,
    pub gartenflaeche: Option<String>,
    pub vermietbare_flaeche: Option<String>,
    pub anzahl_zimmer: Option<String>,
    pub anzahl_schlafzimmer: Option<String>,
    pub anzahl_badezimmer: Option<String>,
    pub anzahl_balkone: Option<String>,
    pub anzahl_terrassen: Option<String>,
    pub anzahl_stellplaetze: Option<String>,
}

// ── Equipment ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ausstattung {
    pub ausstatt_kategorie: Option<String>,
    pub wg_geeignet: Option<String>,
    pub raeume_veraenderbar: Option<String>,
    pub bad: Option<Bad>,
    pub kueche: Option<Kueche>,
    pub boden: Option<Boden>,
    pub kamin: Option<String>,
    pub heizungsart: Option<Heizungsart>,
    pub fahrstuhl: Option<Fahrstuhl>,
    #[serde(default)]
    pub stellplatzart: Vec<Stellplatzart>,
    pub ausricht_balkon_terrasse: Option<AusrichtBalkonTerrasse>,
    pub moebliert: Option<Moebliert>,
    pub rollstuhlgerecht: Option<String>,
    pub klimatisiert: Option<String>,
    pub gartennutzung: Option<String>,
    pub unterkellert: Option<Unterkellert>,
    pub wintergarten: Option<String>,
    pub sauna: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bad {
    #[serde(rename = "@DUSCHE")]
    pub dusche: Option<String>,
    #[serde(rename = "@WANNE")]
    pub wanne: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Kueche {
    #[serde(rename = "@EBK")]
    pub ebk: Option<String>,
    #[serde(rename = "@OFFEN")]
    pub offen: Option<String>,
    #[serde(rename = "@PANTRY")]
    pub pantry: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Boden {
    #[serde(rename = "@FLIESEN")]
    pub fliesen: Option<String>,
    #[serde(rename = "@STEIN")]
    pub stein: Option<String>,
    #[serde(rename = "@TEPPICH")]
    pub teppich: Option<String>,
    #[serde(rename = "@PARKETT")]
    pub parkett: Option<String>,
    #[serde(rename = "@FERTIGPARKETT")]
    pub fertigparkett: Option<String>,
    #[serde(rename = "@LAMINAT")]
    pub laminat: Option<String>,
    #[serde(rename = "@DIELEN")]
    pub dielen: Option<String>,
    #[serde(rename = "@KUNSTSTOFF")]
    pub kunststoff: Option<String>,
    #[serde(rename = "@ESTRICH")]
    pub estrich: Option<String>,
    #[serde(rename = "@DOPPELBODEN")]
    pub doppelboden: Option<String>,
    #[serde(rename = "@LINOLEUM")]
    pub linoleum: Option<String>,
    #[serde(rename = "@MARMOR")]
    pub marmor: Option<String>,
    #[serde(rename = "@TERRAKOTTA")]
    pub terrakotta: Option<String>,
    #[serde(rename = "@GRANIT")]
    pub granit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Heizungsart {
    #[serde(rename = "@OFEN")]
    pub ofen: Option<String>,
    #[serde(rename = "@ETAGE")]
    pub etage: Option<String>,
    #[serde(rename = "@ZENTRAL")]
    pub zentral: Option<String>,
    #[serde(rename = "@FERN")]
    pub fern: Option<String>,
    #[serde(rename = "@FUSSBODEN")]
    pub fussboden: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fahrstuhl {
    #[serde(rename = "@PERSONEN")]
    pub personen: Option<String>,
    #[serde(rename = "@LASTEN")]
    pub lasten: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stellplatzart {
    #[serde(rename = "@GARAGE")]
    pub garage: Option<String>,
    #[serde(rename = "@TIEFGARAGE")]
    pub tiefgarage: Option<String>,
    #[serde(rename = "@CARPORT")]
    pub carport: Option<String>,
    #[serde(rename = "@FREIPLATZ")]
    pub freiplatz: Option<String>,
    #[serde(rename = "@PARKHAUS")]
    pub parkhaus: Option<String>,
    #[serde(rename = "@DUPLEX")]
    pub duplex: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AusrichtBalkonTerrasse {
    #[serde(rename = "@NORD")]
    pub nord: Option<String>,
    #[serde(rename = "@OST")]
    pub ost: Option<String>,
    #[serde(rename = "@SUED")]
    pub sued: Option<String>,
    #[serde(rename = "@WEST")]
    pub west: Option<String>,
    #[serde(rename = "@NORDOST")]
    pub nordost: Option<String>,
    #[serde(rename = "@NORDWEST")]
    pub nordwest: Option<String>,
    #[serde(rename = "@SUEDOST")]
    pub suedost: Option<String>,
    #[serde(rename = "@SUEDWEST")]
    pub suedwest: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Moebliert {
    #[serde(rename = "@moeb")]
    pub moeb: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Unterkellert {
    #[serde(rename = "@keller")]
    pub keller: Option<String>,
}

// ── Condition ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZustandAngaben {
    pub baujahr: Option<String>,
    pub zustand: Option<Zustand>,
    #[serde(default)]
    pub energiepass: Vec<Energiepass>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Zustand {
    #[serde(rename = "@zustand_art")]
    pub zustand_art: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Energiepass {
    pub epart: Option<String>,
    pub gueltig_bis: Option<String>,
    pub energieverbrauchkennwert: Option<String>,
    pub mitwarmwasser: Option<String>,
    pub endenergiebedarf: Option<String>,
    pub primaerenergietraeger: Option<String>,
    pub stromwert: Option<String>,
    pub waermewert: Option<String>,
    pub wertklasse: Option<String>,
}

// ── Infrastructure ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Infrastruktur {
    #[serde(default)]
    pub distanzen: Vec<Distanz>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Distanz {
    #[serde(rename = "@distanz_zu")]
    pub distanz_zu: Option<String>,
    #[serde(rename = "$text")]
    pub value: Option<String>,
}

// ── Free texts ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Freitexte {
    pub objekttitel: Option<String>,
    pub dreizeiler: Option<String>,
    pub lage: Option<String>,
    pub ausstatt_beschr: Option<String>,
    pub objektbeschreibung: Option<String>,
    pub sonstige_angaben: Option<String>,
}

// ── Attachments ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Anhaenge {
    #[serde(default)]
    pub anhang: Vec<Anhang>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Anhang {
    #[serde(rename = "@location")]
    pub location: Option<String>,
    #[serde(rename = "@gruppe")]
    pub gruppe: Option<String>,
    pub anhangtitel: Option<String>,
    pub format: Option<String>,
    pub daten: Option<Daten>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Daten {
    pub pfad: Option<String>,
}

// ── Administration ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerwaltungObjekt {
    pub objektadresse_freigeben: Option<String>,
    pub verfuegbar_ab: Option<String>,
    pub abdatum: Option<String>,
    pub bisdatum: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerwaltungTechn {
    pub objektnr_intern: Option<String>,
    pub objektnr_extern: Option<String>,
    pub aktion: Option<Aktion>,
    pub openimmo_obid: Option<String>,
    pub stand_vom: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Aktion {
    #[serde(rename = "@aktionart")]
    pub aktionart: Option<String>,
}

/// Interpret an OpenImmo boolean (`true`/`1`, case-insensitive).
#[must_use]
pub fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v == "1" || v.eq_ignore_ascii_case("true")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_nested_listing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<openimmo>
  <uebertragung art="ONLINE" umfang="VOLL" modus="CHANGE" version="1.2.7" sendersoftware="OOF" senderversion="1.0"/>
  <anbieter>
    <anbieternr>foo-123</anbieternr>
    <firma>eBlick Medienberatung</firma>
    <immobilie>
      <objektkategorie>
        <nutzungsart WOHNEN="true" GEWERBE="false"/>
        <objektart><haus haustyp="EINFAMILIENHAUS"/></objektart>
      </objektkategorie>
      <preise><kaufpreis auf_anfrage="false">299000.50</kaufpreis></preise>
      <infrastruktur>
        <distanzen distanz_zu="AUTOBAHN">2.00</distanzen>
        <distanzen distanz_zu="ZENTRUM">1.50</distanzen>
      </infrastruktur>
      <anhaenge>
        <anhang location="EXTERN" gruppe="TITELBILD"><daten><pfad>Titel.jpg</pfad></daten></anhang>
        <anhang location="EXTERN" gruppe="BILD"><daten><pfad>Bad.jpg</pfad></daten></anhang>
      </anhaenge>
      <verwaltung_techn><openimmo_obid>AB123</openimmo_obid></verwaltung_techn>
    </immobilie>
  </anbieter>
</openimmo>"#;

        let data: OpenImmo = quick_xml::de::from_str(xml).unwrap();

        let envelope = data.uebertragung.unwrap();
        assert_eq!(envelope.umfang.as_deref(), Some("VOLL"));
        assert_eq!(envelope.sendersoftware.as_deref(), Some("OOF"));

        let anbieter = &data.anbieter[0];
        assert_eq!(anbieter.firma.as_deref(), Some("eBlick Medienberatung"));
        let immobilie = &anbieter.immobilie[0];

        let kategorie = immobilie.objektkategorie.as_ref().unwrap();
        assert!(is_true(
            kategorie.nutzungsart.as_ref().unwrap().wohnen.as_deref()
        ));
        let haus = &kategorie.objektart.as_ref().unwrap().haus[0];
        assert_eq!(haus.value.as_deref(), Some("EINFAMILIENHAUS"));

        let preis = immobilie.preise.as_ref().unwrap().kaufpreis.as_ref().unwrap();
        assert_eq!(preis.text(), Some("299000.50"));

        let distanzen = &immobilie.infrastruktur.as_ref().unwrap().distanzen;
        assert_eq!(distanzen.len(), 2);
        assert_eq!(distanzen[1].value.as_deref(), Some("1.50"));

        assert_eq!(immobilie.anhaenge.as_ref().unwrap().anhang.len(), 2);
    }

    #[test]
    fn test_interleaved_repeated_elements() {
        let xml = r#"<openimmo>
  <anbieter>
    <anbieternr>foo-123</anbieternr>
    <immobilie>
      <objektkategorie>
        <objektart>
          <wohnung wohnungtyp="ETAGE"/>
          <haus haustyp="REIHENHAUS"/>
          <wohnung wohnungtyp="PENTHOUSE"/>
        </objektart>
      </objektkategorie>
      <verwaltung_techn><openimmo_obid>A</openimmo_obid></verwaltung_techn>
    </immobilie>
    <user_defined_simplefield feldname="x">y</user_defined_simplefield>
    <immobilie>
      <verwaltung_techn><openimmo_obid>B</openimmo_obid></verwaltung_techn>
    </immobilie>
  </anbieter>
</openimmo>"#;

        let data: OpenImmo = quick_xml::de::from_str(xml).unwrap();
        let anbieter = &data.anbieter[0];
        assert_eq!(anbieter.immobilie.len(), 2);

        let objektart = anbieter.immobilie[0]
            .objektkategorie
            .as_ref()
            .unwrap()
            .objektart
            .as_ref()
            .unwrap();
        let wohnungen: Vec<_> = objektart
            .wohnung
            .iter()
            .map(|w| w.value.as_deref().unwrap())
            .collect();
        assert_eq!(wohnungen, ["ETAGE", "PENTHOUSE"]);
        assert_eq!(objektart.haus.len(), 1);
    }

    #[test]
    fn test_is_true() {
        assert!(is_true(Some("true")));
        assert!(is_true(Some("TRUE")));
        assert!(is_true(Some("1")));
        assert!(!is_true(Some("false")));
        assert!(!is_true(Some("0")));
        assert!(!is_true(None));
    }
}
