//! # Authority Response Reader
//!
//! Extracts the handful of values the lifecycle needs from an
//! authority-format response: the envelope status and reason, the batch
//! receipt, the authorization protocol block (`infProt`), the event block
//! (`infEvento`) and the access key.
//!
//! The reader is deliberately shallow. It looks for leaf elements by name and
//! never interprets anything it was not asked for; absent values are `None`,
//! never defaults.

use serde::{Deserialize, Serialize};

/// Authorization protocol (`protMDFe/infProt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub status: Option<u16>,
    pub reason: Option<String>,
    /// Authorization protocol number (`nProt`).
    pub protocol: Option<String>,
    pub key: Option<String>,
    pub received_at: Option<String>,
}

/// Event registration result (`retEvento/infEvento`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub status: Option<u16>,
    pub reason: Option<String>,
    pub event_type: Option<String>,
    pub protocol: Option<String>,
}

/// Values read from one response document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityResponse {
    /// Envelope status (`cStat`, first occurrence).
    pub status: Option<u16>,
    /// Envelope reason (`xMotivo`, first occurrence).
    pub reason: Option<String>,
    /// Batch receipt (`nRec`).
    pub receipt: Option<String>,
    pub protocol: Option<ProtocolInfo>,
    pub event: Option<EventInfo>,
    /// Access key (`chMDFe`, or the `Id="MDFe…"` attribute of a signed document).
    pub key: Option<String>,
    /// Keys listed by an open-manifest query.
    pub open_keys: Vec<String>,
}

impl AuthorityResponse {
    pub fn read(body: &str) -> Self {
        let protocol = section(body, "infProt").map(|inner| ProtocolInfo {
            status: leaf(inner, "cStat").and_then(|s| s.parse().ok()),
            reason: leaf(inner, "xMotivo"),
            protocol: leaf(inner, "nProt"),
            key: leaf(inner, "chMDFe"),
            received_at: leaf(inner, "dhRecbto"),
        });
        let event = section(body, "infEvento").map(|inner| EventInfo {
            status: leaf(inner, "cStat").and_then(|s| s.parse().ok()),
            reason: leaf(inner, "xMotivo"),
            event_type: leaf(inner, "tpEvento"),
            protocol: leaf(inner, "nProt"),
        });
        let key = leaf(body, "chMDFe").or_else(|| id_attribute_key(body));

        Self {
            status: leaf(body, "cStat").and_then(|s| s.parse().ok()),
            reason: leaf(body, "xMotivo"),
            receipt: leaf(body, "nRec"),
            protocol,
            event,
            key,
            open_keys: all_leaves(body, "chMDFe"),
        }
    }

    /// The most specific status present: protocol, then event, then envelope.
    pub fn effective_status(&self) -> Option<u16> {
        self.protocol
            .as_ref()
            .and_then(|p| p.status)
            .or_else(|| self.event.as_ref().and_then(|e| e.status))
            .or(self.status)
    }

    /// Reason matching [`AuthorityResponse::effective_status`].
    pub fn effective_reason(&self) -> Option<&str> {
        if let Some(p) = self.protocol.as_ref().filter(|p| p.status.is_some()) {
            return p.reason.as_deref();
        }
        if let Some(e) = self.event.as_ref().filter(|e| e.status.is_some()) {
            return e.reason.as_deref();
        }
        self.reason.as_deref()
    }
}

/// Inner text of the first `<tag>` … `</tag>` element, entities decoded.
fn leaf(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(unescape(xml[start..end].trim()))
}

/// Decode the five predefined XML entities. Anything else is kept as-is.
fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .into_iter()
        .find(|(entity, _)| rest.starts_with(entity));
        match decoded {
            Some((entity, c)) => {
                out.push(c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn all_leaves(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some(pos) = rest.find(&open) {
        let start = pos + open.len();
        let Some(len) = rest[start..].find(&close) else {
            break;
        };
        out.push(unescape(rest[start..start + len].trim()));
        rest = &rest[start + len + close.len()..];
    }
    out
}

/// Content of the first `<tag …>` … `</tag>` element, attributes allowed.
fn section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut from = 0;
    while let Some(pos) = xml[from..].find(&open) {
        let after = from + pos + open.len();
        match xml[after..].chars().next() {
            Some('>') | Some(' ') => {
                let gt = xml[after..].find('>')? + after + 1;
                let end = xml[gt..].find(&close)? + gt;
                return Some(&xml[gt..end]);
            }
            _ => from = after,
        }
    }
    None
}

/// `Id="MDFe<44 digits>"` on the signed `infMDFe` element.
fn id_attribute_key(xml: &str) -> Option<String> {
    let marker = "Id=\"MDFe";
    let start = xml.find(marker)? + marker.len();
    let digits: String = xml[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (digits.len() == 44).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "35240111222333000181580010000001231000000011";

    #[test]
    fn reads_batch_receipt() {
        let r = AuthorityResponse::read(
            "<retEnviMDFe><cStat>103</cStat><xMotivo>Lote recebido com sucesso</xMotivo>\
             <infRec><nRec>351000000000001</nRec></infRec></retEnviMDFe>",
        );
        assert_eq!(r.status, Some(103));
        assert_eq!(r.receipt.as_deref(), Some("351000000000001"));
        assert!(r.protocol.is_none());
        assert_eq!(r.effective_status(), Some(103));
    }

    #[test]
    fn protocol_status_wins_over_envelope() {
        let body = format!(
            "<retConsReciMDFe><cStat>104</cStat><xMotivo>Lote processado</xMotivo>\
             <protMDFe versao=\"3.00\"><infProt Id=\"ID935240000000001\">\
             <chMDFe>{KEY}</chMDFe><dhRecbto>2024-01-15T10:31:00-03:00</dhRecbto>\
             <nProt>935240000000001</nProt><cStat>100</cStat>\
             <xMotivo>Autorizado o uso do MDF-e</xMotivo></infProt></protMDFe></retConsReciMDFe>"
        );
        let r = AuthorityResponse::read(&body);
        assert_eq!(r.status, Some(104));
        assert_eq!(r.effective_status(), Some(100));
        assert_eq!(r.effective_reason(), Some("Autorizado o uso do MDF-e"));
        let p = r.protocol.unwrap();
        assert_eq!(p.protocol.as_deref(), Some("935240000000001"));
        assert_eq!(p.key.as_deref(), Some(KEY));
    }

    #[test]
    fn reads_event_block() {
        let r = AuthorityResponse::read(
            "<retEventoMDFe><infEvento Id=\"ID1\"><tpAmb>2</tpAmb><cStat>135</cStat>\
             <xMotivo>Evento registrado e vinculado a MDF-e</xMotivo>\
             <tpEvento>110111</tpEvento><nProt>935240000000002</nProt></infEvento></retEventoMDFe>",
        );
        assert_eq!(r.effective_status(), Some(135));
        let e = r.event.unwrap();
        assert_eq!(e.event_type.as_deref(), Some("110111"));
        assert_eq!(e.protocol.as_deref(), Some("935240000000002"));
    }

    #[test]
    fn reads_key_from_signed_document() {
        let body = format!("<MDFe><infMDFe Id=\"MDFe{KEY}\" versao=\"3.00\"></infMDFe></MDFe>");
        assert_eq!(AuthorityResponse::read(&body).key.as_deref(), Some(KEY));
    }

    #[test]
    fn section_does_not_match_longer_tag_names() {
        let r = AuthorityResponse::read("<infProtX><cStat>1</cStat></infProtX>");
        assert!(r.protocol.is_none());
    }

    #[test]
    fn lists_open_keys() {
        let body = format!(
            "<retConsMDFeNaoEnc><cStat>111</cStat><infMDFe><chMDFe>{KEY}</chMDFe>\
             <nProt>1</nProt></infMDFe><infMDFe><chMDFe>{KEY}</chMDFe><nProt>2</nProt></infMDFe>\
             </retConsMDFeNaoEnc>"
        );
        assert_eq!(AuthorityResponse::read(&body).open_keys.len(), 2);
    }

    #[test]
    fn decodes_predefined_entities() {
        let r = AuthorityResponse::read(
            "<retConsStatServMDFe><cStat>108</cStat>\
             <xMotivo>Servico Paralisado &amp; em manutencao &lt;SVRS&gt; &quot;temporario&quot; &apos;x&apos; &copy;</xMotivo>\
             </retConsStatServMDFe>",
        );
        assert_eq!(
            r.reason.as_deref(),
            Some("Servico Paralisado & em manutencao <SVRS> \"temporario\" 'x' &copy;")
        );
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape("sem entidades"), "sem entidades");
    }

    #[test]
    fn garbage_yields_nothing() {
        let r = AuthorityResponse::read("not xml at all");
        assert_eq!(r.status, None);
        assert_eq!(r.effective_status(), None);
        assert!(r.key.is_none());
    }
}
