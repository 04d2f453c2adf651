//! Content tagging of programme names.
//!
//! Picks sport and event keywords (Swedish, English, Finnish, Norwegian,
//! Danish, Italian, Spanish, French) out of a channel display name so the
//! recording file name says what was recorded.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords matched case-insensitively as substrings.
const KEYWORDS: &[&str] = &[
    // football
    "fotboll", "football", "soccer", "fútbol", "futbol", "calcio", "jalkapallo", "fotball",
    "fodbold",
    // ice hockey
    "ishockey", "ice hockey", "hockey sur glace", "hockey sobre hielo", "hockey su ghiaccio",
    "jääkiekko", "hockey",
    // handball
    "handboll", "handball", "balonmano", "pallamano", "käsipallo", "håndball", "håndbold",
    // basketball
    "basket", "basketball", "baloncesto", "pallacanestro", "koripallo", "basketbol",
    // tennis
    "tennis", "tenis", "bordtennis", "table tennis", "pingis", "tennis de table",
    "tenis de mesa", "pöytätennis",
    "badminton", "bádminton",
    "baseboll", "baseball", "béisbol",
    "rugby",
    "amerikansk fotboll", "american football", "futbol americano",
    "innebandy", "floorball", "salibandy",
    "volleyboll", "volleyball", "voleibol", "pallavolo", "lentopallo",
    "friidrott", "athletics", "track and field", "atletismo", "atletica", "yleisurheilu",
    "simning", "swimming", "natation", "natación", "nuoto", "uinti",
    // cycling and the big races
    "cykel", "cycling", "ciclismo", "pyöräily", "sykling", "ciclisme",
    "tour de france", "giro d'italia", "vuelta a españa", "paris-roubaix", "milano-sanremo",
    "il lombardia", "tirreno-adriatico", "strade bianche", "gent-wevelgem",
    // stages
    "etapp", "stage", "etape", "tappa", "etapa",
    "skidåkning", "skiing", "sci", "esquí", "hiihto", "langrenn", "alpint",
    "snowboard",
    "gymnastik", "gymnastics", "gimnasia", "ginnastica", "voimistelu",
    "kampsport", "martial arts", "arti marziali", "artes marciales",
    "boxning", "boxing", "boxe", "boxeo", "nyrkkeily",
    "brottning", "wrestling", "lucha libre", "paini",
    "fäktning", "fencing", "escrime", "esgrima", "miekkailu",
    "ridsport", "equestrian", "équitation", "equitación", "ratsastus",
    "löpning", "running", "juoksu",
    "simhopp", "diving", "plongeon", "clavados", "tuffi",
    "kanot", "canoeing", "canoë", "piragüismo", "melonta",
    "segling", "sailing", "voile", "purjehdus",
    "triathlon", "triatlón", "triatlon",
    "golf",
];

/// Stage words that can carry a number (`Etapp 5`).
const STAGE_WORDS: &[&str] = &["etapp", "stage", "etape", "tappa", "etapa"];

static TIME_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2} ").unwrap());

static NUMBERED_STAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(etapp|stage|etape|tappa|etapa) ?(\d+)").unwrap());

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn tag_for(keyword: &str) -> String {
    NON_ALNUM.replace_all(&capitalize(keyword), "_").into_owned()
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// Extract event tags from a display name, in order of first appearance.
///
/// A numbered stage (`Etapp_5`) replaces the bare stage word it was built
/// from. Numbered stages are listed after the other tags.
pub fn extract_tags(display_name: &str) -> Vec<String> {
    let stripped = TIME_PREFIX.replace(display_name, "");
    let name = stripped.trim();

    let mut tags: Vec<String> = Vec::new();
    let mut stages: Vec<String> = Vec::new();

    for part in name.split(['|', '[']) {
        let lower = part.to_lowercase();
        for keyword in KEYWORDS {
            if lower.contains(keyword) {
                push_unique(&mut tags, tag_for(keyword));
            }
        }
        for caps in NUMBERED_STAGE.captures_iter(part) {
            let word = capitalize(&caps[1].to_lowercase());
            push_unique(&mut stages, format!("{}_{}", word, &caps[2]));
        }
    }

    for word in STAGE_WORDS {
        let bare = tag_for(word);
        let prefix = format!("{}_", bare);
        if stages.iter().any(|s| s.starts_with(&prefix)) {
            tags.retain(|t| t != &bare);
        }
    }

    tags.extend(stages);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tags_for_plain_name() {
        assert!(extract_tags("Evening News").is_empty());
    }

    #[test]
    fn test_keyword_is_capitalized() {
        assert_eq!(extract_tags("Fotboll: AIK - Hammarby"), vec!["Fotboll"]);
    }

    #[test]
    fn test_time_prefix_is_ignored() {
        assert_eq!(extract_tags("13:15 golf live"), vec!["Golf"]);
    }

    /// "Etapp 5" yields Etapp_5 and suppresses the bare "Etapp".
    #[test]
    fn test_numbered_stage_replaces_bare_word() {
        let tags = extract_tags("Cykel | Tour de France Etapp 5");
        assert_eq!(tags, vec!["Cykel", "Tour_de_france", "Etapp_5"]);
    }

    #[test]
    fn test_multiword_keywords_are_sanitized() {
        let tags = extract_tags("Ice Hockey World Championship");
        assert!(tags.contains(&"Ice_hockey".to_string()));
        assert!(tags.contains(&"Hockey".to_string()));
    }

    #[test]
    fn test_no_duplicates_across_parts() {
        let tags = extract_tags("Golf | Golf [Golf]");
        assert_eq!(tags, vec!["Golf"]);
    }
}
