//! Team finder scoring and leaderboard ranking.

use itertools::Itertools;

/// Number of `theirs` tags that also appear in `mine`.
pub fn match_score(mine: &[String], theirs: &[String]) -> usize {
    if mine.is_empty() {
        return 0;
    }
    theirs.iter().filter(|tag| mine.contains(tag)).count()
}

pub fn shared_tags(mine: &[String], theirs: &[String]) -> Vec<String> {
    theirs
        .iter()
        .filter(|tag| mine.contains(tag))
        .cloned()
        .collect()
}

/// What the team finder needs to know about a candidate.
pub trait Candidate {
    fn name(&self) -> &str;
    fn bio(&self) -> Option<&str>;
    fn tags(&self) -> &[String];
}

/// Case-insensitive substring search over name, bio and tags.
pub fn matches_search<C: Candidate>(candidate: &C, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    candidate.name().to_lowercase().contains(&needle)
        || candidate
            .bio()
            .map_or(false, |bio| bio.to_lowercase().contains(&needle))
        || candidate
            .tags()
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
}

pub struct Scored<C> {
    pub candidate: C,
    pub score: usize,
    pub shared: Vec<String>,
}

/// Drops the caller, applies the search and optionally orders by score.
///
/// Sorting is stable: equal scores keep the order the candidates came in.
pub fn find_team<C, F>(
    candidates: Vec<C>,
    is_self: F,
    my_tags: &[String],
    search: &str,
    sort_by_match: bool,
) -> Vec<Scored<C>>
where
    C: Candidate,
    F: Fn(&C) -> bool,
{
    let scored = candidates
        .into_iter()
        .filter(|c| !is_self(c))
        .filter(|c| matches_search(c, search))
        .map(|c| Scored {
            score: match_score(my_tags, c.tags()),
            shared: shared_tags(my_tags, c.tags()),
            candidate: c,
        });

    if sort_by_match {
        scored.sorted_by(|a, b| b.score.cmp(&a.score)).collect()
    } else {
        scored.collect()
    }
}

/// Leaderboard order: registered events plus known languages, highest first.
pub fn rank_by_activity<T>(entries: Vec<(T, usize, usize)>) -> Vec<(T, usize)> {
    entries
        .into_iter()
        .map(|(entry, events, languages)| (entry, events + languages))
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .collect()
}

/// Splits a comma separated tag list, trimming and dropping blanks and repeats.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unique()
        .collect()
}
