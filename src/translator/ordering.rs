use crate::error::CayenneResult;
use crate::query::Ordering;

use super::assembler::TranslationContext;

/// Render the ORDER BY list, or `None` when there are no orderings.
/// Paths crossing relationships add joins like qualifier paths do.
pub fn translate_orderings(
    ctx: &mut TranslationContext<'_>,
    orderings: &[Ordering],
) -> CayenneResult<Option<String>> {
    if orderings.is_empty() {
        return Ok(None);
    }

    let mut parts = Vec::with_capacity(orderings.len());
    for ordering in orderings {
        let column = ctx.resolve(&ordering.expression())?.sql();
        let mut part = if ordering.case_insensitive {
            format!("{}({})", ctx.adapter().upper_function(), column)
        } else {
            column
        };
        if !ordering.ascending {
            part.push_str(" DESC");
        }
        parts.push(part);
    }
    Ok(Some(parts.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::JdbcAdapter;
    use crate::map::testing::artist_map;
    use crate::query::QueryRoot;

    #[test]
    fn test_orderings() {
        let map = artist_map();
        let adapter = JdbcAdapter::new();
        let mut ctx =
            TranslationContext::rooted(&adapter, &map, &QueryRoot::Obj("Painting".into()), true).unwrap();
        let sql = translate_orderings(
            &mut ctx,
            &[
                Ordering::asc("toArtist.artistName").ignore_case(),
                Ordering::desc("estimatedPrice"),
            ],
        )
        .unwrap()
        .unwrap();
        assert_eq!(sql, "UPPER(t1.ARTIST_NAME), t0.ESTIMATED_PRICE DESC");
        assert_eq!(ctx.joins().unwrap().table_count(), 2);
        assert!(translate_orderings(&mut ctx, &[]).unwrap().is_none());
    }
}
