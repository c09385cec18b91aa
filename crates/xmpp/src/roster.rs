//! Roster (RFC 6121 contact list) queries and replies.

use crate::{
    minidom::Element,
    stanza::{ncname, ns},
};

/// IQ id used for the roster request sent after each login.
pub const ROSTER_QUERY_ID: &str = "acc-roster";

/// One contact from the server-side roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterItem {
    pub jid: String,
    pub name: Option<String>,
    /// `none`, `to`, `from`, `both`, or `remove` in a roster push.
    pub subscription: String,
    pub groups: Vec<String>,
}

impl RosterItem {
    /// Name to show for this contact.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.jid)
    }
}

/// Build `<iq type="get"><query xmlns="jabber:iq:roster"/></iq>`.
pub fn build_roster_query(from: &str, id: &str) -> Element {
    Element::builder("iq", ns::JABBER_CLIENT)
        .attr(ncname("from"), from)
        .attr(ncname("id"), id)
        .attr(ncname("type"), "get")
        .append(Element::builder("query", ns::ROSTER).build())
        .build()
}

/// Items of the roster `<query>` inside `iq`, or `None` if it carries none.
pub fn parse_roster(iq: &Element) -> Option<Vec<RosterItem>> {
    let query = iq.get_child("query", ns::ROSTER)?;
    let items = query
        .children()
        .filter(|c| c.is("item", ns::ROSTER))
        .filter_map(parse_item)
        .collect();
    Some(items)
}

fn parse_item(item: &Element) -> Option<RosterItem> {
    let jid = item.attr("jid")?.to_string();
    let groups = item
        .children()
        .filter(|c| c.is("group", ns::ROSTER))
        .map(|g| g.text())
        .filter(|g| !g.is_empty())
        .collect();
    Some(RosterItem {
        jid,
        name: item.attr("name").filter(|n| !n.is_empty()).map(str::to_string),
        subscription: item.attr("subscription").unwrap_or("none").to_string(),
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_result(items: Vec<Element>) -> Element {
        let mut query = Element::builder("query", ns::ROSTER);
        for item in items {
            query = query.append(item);
        }
        Element::builder("iq", ns::JABBER_CLIENT)
            .attr(ncname("id"), ROSTER_QUERY_ID)
            .attr(ncname("type"), "result")
            .append(query.build())
            .build()
    }

    fn item(jid: &str) -> crate::minidom::ElementBuilder {
        Element::builder("item", ns::ROSTER).attr(ncname("jid"), jid)
    }

    #[test]
    fn query_shape() {
        let el = build_roster_query("me@example.com/acc", ROSTER_QUERY_ID);
        assert_eq!(el.name(), "iq");
        assert_eq!(el.attr("type"), Some("get"));
        assert_eq!(el.attr("id"), Some(ROSTER_QUERY_ID));
        assert!(el.get_child("query", ns::ROSTER).is_some());
    }

    #[test]
    fn parse_items() {
        let iq = roster_result(vec![
            item("alice@example.com")
                .attr(ncname("name"), "Alice")
                .attr(ncname("subscription"), "both")
                .append(
                    Element::builder("group", ns::ROSTER)
                        .append("Friends")
                        .build(),
                )
                .build(),
            item("bob@example.com").build(),
        ]);

        let items = parse_roster(&iq).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].jid, "alice@example.com");
        assert_eq!(items[0].display_name(), "Alice");
        assert_eq!(items[0].subscription, "both");
        assert_eq!(items[0].groups, vec!["Friends"]);
        assert_eq!(items[1].name, None);
        assert_eq!(items[1].display_name(), "bob@example.com");
        assert_eq!(items[1].subscription, "none");
    }

    #[test]
    fn items_without_jid_are_skipped() {
        let iq = roster_result(vec![
            Element::builder("item", ns::ROSTER).build(),
            item("carol@example.com").build(),
        ]);
        let items = parse_roster(&iq).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].jid, "carol@example.com");
    }

    #[test]
    fn empty_roster() {
        let items = parse_roster(&roster_result(vec![])).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn iq_without_query() {
        let iq = Element::builder("iq", ns::JABBER_CLIENT)
            .attr(ncname("type"), "result")
            .build();
        assert!(parse_roster(&iq).is_none());
    }
}
