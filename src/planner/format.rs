//! Chat message rendering (Telegram HTML parse mode).
//!
//! Everything that came from the model or the database is escaped. Long
//! messages are returned pre-split into chunks that fit Telegram's limit.

use chrono::NaiveDate;
use teloxide::utils::html::{bold, escape, italic};

use super::normalize::{NormalizedPlan, PlanDay};
use crate::store::Recipe;

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Render a freshly generated plan.
pub fn weekly_plan_message(plan: &NormalizedPlan) -> Vec<String> {
    let mut sections = vec![format!(
        "✨ {} ✨\n",
        bold(&format!("Your {}-day meal plan is ready!", plan.days.len()))
    )];
    sections.extend(plan.days.iter().map(day_section));
    pack_chunks(sections, MAX_MESSAGE_LENGTH)
}

fn day_section(day: &PlanDay) -> String {
    let mut out = format!(
        "🗓️ {} ({}):\n",
        bold(&escape(&day.day)),
        day.date.format("%Y-%m-%d")
    );
    for meal in &day.meals {
        out.push_str(&format!(
            "   - {} {}\n     (Total macros: {})\n     {} (M: {}, W: {})\n",
            bold(&format!("{}:", escape(&meal.meal_type))),
            escape(&meal.name),
            escape(&meal.macros),
            italic("Portions:"),
            grams(&meal.weight_m),
            grams(&meal.weight_w),
        ));
    }
    out
}

/// `"350"` → `"350g"`; anything non-numeric is shown as-is.
fn grams(weight: &str) -> String {
    if weight.parse::<f64>().is_ok() {
        format!("{weight}g")
    } else {
        escape(weight)
    }
}

/// Render the stored menu for `date`. `recipes` must be non-empty.
pub fn daily_reminder_message(date: NaiveDate, recipes: &[Recipe]) -> Vec<String> {
    let mut sections = vec![format!(
        "🔔 {} 🔔\n",
        bold(&format!("Your menu for today, {}!", date.format("%d.%m.%Y")))
    )];
    sections.extend(recipes.iter().map(|r| {
        format!(
            "🍽️ {}\n\n{}\n\n---\n",
            bold(&escape(&r.meal_name)),
            escape(r.recipe_full.as_deref().unwrap_or(""))
        )
    }));
    pack_chunks(sections, MAX_MESSAGE_LENGTH)
}

/// Plain-text notice for a day without stored recipes.
pub fn no_menu_message(date: NaiveDate) -> String {
    format!(
        "🤔 No menu found for today ({}). Use /generate.",
        date.format("%d.%m.%Y")
    )
}

/// Greedily pack `sections` (joined by a newline) into messages of at most
/// `max` characters. A single oversize section is split with [`split_html`].
pub fn pack_chunks(sections: Vec<String>, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for section in sections {
        let len = section.chars().count();
        let sep = usize::from(!current.is_empty());

        if current_len + sep + len <= max {
            if sep == 1 {
                current.push('\n');
            }
            current.push_str(&section);
            current_len += sep + len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if len <= max {
            current = section;
            current_len = len;
        } else {
            chunks.extend(split_html(&section, max));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split escaped HTML into pieces of at most `max` characters.
///
/// Cuts never land inside a tag or an entity. Tags still open at a cut are
/// closed at the end of the piece and reopened at the start of the next, so
/// every piece parses on its own.
pub fn split_html(html: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut has_content = false;
    // (name, opening tag text)
    let mut open: Vec<(String, String)> = Vec::new();

    for atom in html_atoms(html) {
        let atom_len = atom.chars().count();
        let mut after = open.clone();
        apply_tag(&mut after, atom);
        let closing_len: usize = after.iter().map(|(name, _)| name.chars().count() + 3).sum();

        if has_content && current_len + atom_len + closing_len > max {
            pieces.push(format!("{current}{}", closing_tags(&open)));
            current = open.iter().map(|(_, tag)| tag.as_str()).collect();
            current_len = current.chars().count();
            has_content = false;
        }

        current.push_str(atom);
        current_len += atom_len;
        has_content = true;
        open = after;
    }

    if has_content {
        pieces.push(format!("{current}{}", closing_tags(&open)));
    }
    pieces
}

/// Tags, entities and single characters, in order.
fn html_atoms(html: &str) -> Vec<&str> {
    let mut atoms = Vec::new();
    let mut rest = html;
    while let Some(c) = rest.chars().next() {
        let len = match c {
            '<' => rest.find('>').map_or(1, |end| end + 1),
            '&' => rest
                .char_indices()
                .skip(1)
                .take(10)
                .find(|&(_, ch)| !(ch.is_ascii_alphanumeric() || ch == '#'))
                .filter(|&(_, ch)| ch == ';')
                .map_or(1, |(end, _)| end + 1),
            _ => c.len_utf8(),
        };
        let (atom, tail) = rest.split_at(len);
        atoms.push(atom);
        rest = tail;
    }
    atoms
}

/// Track open tags: push on `<x ...>`, pop the matching `</x>`.
fn apply_tag(open: &mut Vec<(String, String)>, atom: &str) {
    let Some(inner) = atom.strip_prefix('<').and_then(|a| a.strip_suffix('>')) else {
        return;
    };
    if let Some(name) = inner.strip_prefix('/') {
        if let Some(pos) = open.iter().rposition(|(open_name, _)| open_name == name.trim()) {
            open.remove(pos);
        }
    } else if !inner.ends_with('/') {
        let name = inner.split_whitespace().next().unwrap_or_default().to_string();
        if !name.is_empty() {
            open.push((name, atom.to_string()));
        }
    }
}

fn closing_tags(open: &[(String, String)]) -> String {
    open.iter().rev().map(|(name, _)| format!("</{name}>")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::normalize::{PlanDay, PlanMeal};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plan() -> NormalizedPlan {
        NormalizedPlan {
            days: vec![PlanDay {
                day: "Monday".into(),
                date: ymd(2026, 10, 19),
                meals: vec![PlanMeal {
                    meal_type: "Breakfast".into(),
                    name: "Eggs & <toast>".into(),
                    macros: "Kcal: 1000".into(),
                    weight_m: "350".into(),
                    weight_w: "N/A".into(),
                    recipe: "Fry.".into(),
                }],
            }],
        }
    }

    #[test]
    fn weekly_message_escapes_model_text() {
        let msg = weekly_plan_message(&plan());
        assert_eq!(msg.len(), 1);
        let text = &msg[0];
        assert!(text.contains("<b>Your 1-day meal plan is ready!</b>"));
        assert!(text.contains("<b>Monday</b> (2026-10-19)"));
        assert!(text.contains("Eggs &amp; &lt;toast&gt;"));
        assert!(text.contains("(M: 350g, W: N/A)"));
    }

    #[test]
    fn reminder_lists_recipes() {
        let recipes = vec![Recipe {
            id: 1,
            meal_date: ymd(2026, 10, 19),
            meal_name: "Soup".into(),
            recipe_full: Some("Boil <water>".into()),
            generated_at: "2026-10-18T10:00:00Z".into(),
        }];
        let msg = daily_reminder_message(ymd(2026, 10, 19), &recipes);
        assert!(msg[0].contains("Your menu for today, 19.10.2026!"));
        assert!(msg[0].contains("<b>Soup</b>"));
        assert!(msg[0].contains("Boil &lt;water&gt;"));
    }

    #[test]
    fn no_menu_uses_dotted_date() {
        assert!(no_menu_message(ymd(2026, 1, 5)).contains("(05.01.2026)"));
    }

    #[test]
    fn pack_keeps_small_sections_together() {
        let chunks = pack_chunks(vec!["aa".into(), "bb".into(), "cc".into()], 5);
        assert_eq!(chunks, vec!["aa\nbb".to_string(), "cc".to_string()]);
    }

    #[test]
    fn pack_splits_oversize_section() {
        let chunks = pack_chunks(vec!["x".into(), "é".repeat(7)], 3);
        assert_eq!(chunks, vec!["x".to_string(), "ééé".into(), "ééé".into(), "é".into()]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[test]
    fn oversize_section_never_cuts_an_entity() {
        let section = format!("<b>Soup</b>\n\n{}", "&amp;".repeat(1000));
        let chunks = pack_chunks(vec![section], MAX_MESSAGE_LENGTH);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_MESSAGE_LENGTH);
            assert_eq!(chunk.matches('&').count(), chunk.matches("&amp;").count(), "broken entity");
        }
        assert_eq!(chunks.concat().matches("&amp;").count(), 1000);
    }

    #[test]
    fn split_reopens_tags_across_pieces() {
        let pieces = split_html(&format!("<b>{}</b>", "x".repeat(10)), 8);
        assert_eq!(pieces.len(), 10);
        for piece in &pieces {
            assert_eq!(piece, "<b>x</b>");
        }
    }

    #[test]
    fn split_keeps_nested_tags_balanced() {
        let html = format!("<b>{}<i>{}</i></b> tail &lt;", "a".repeat(20), "b".repeat(20));
        let pieces = split_html(&html, 16);
        for piece in &pieces {
            assert!(piece.chars().count() <= 16, "{piece}");
            assert_eq!(piece.matches("<b>").count(), piece.matches("</b>").count(), "{piece}");
            assert_eq!(piece.matches("<i>").count(), piece.matches("</i>").count(), "{piece}");
        }
        let text: String = pieces.concat().replace("<b>", "").replace("</b>", "").replace("<i>", "").replace("</i>", "");
        assert_eq!(text, format!("{}{} tail &lt;", "a".repeat(20), "b".repeat(20)));
    }

    #[test]
    fn pack_empty_is_empty() {
        assert!(pack_chunks(Vec::new(), 10).is_empty());
    }
}
