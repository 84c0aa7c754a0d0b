//! Row bands and neighbourhood queries over one image's tokens.

use std::cmp::Ordering;

use crate::models::config::DistanceMetric;
use crate::models::token::{Token, TokenId};
use crate::ocr::BBox;

/// Where a token lies relative to a query box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Any,
    Left,
    Right,
    Above,
    Below,
}

impl Direction {
    /// Direction of `target` as seen from `origin`. Boxes sharing a row are
    /// left or right of each other, all others above or below.
    pub fn of(target: &BBox, origin: &BBox, row_fraction: f32) -> Direction {
        let (tx, ty) = target.center();
        let (ox, oy) = origin.center();
        if target.shares_row(origin, row_fraction) {
            if tx < ox { Direction::Left } else { Direction::Right }
        } else if ty < oy {
            Direction::Above
        } else {
            Direction::Below
        }
    }

    /// Whether a concrete direction satisfies this filter.
    pub fn accepts(&self, actual: Direction) -> bool {
        *self == Direction::Any || *self == actual
    }

    /// Preference of a product position relative to its price; lower wins.
    pub fn rank(&self) -> u8 {
        match self {
            Direction::Left => 0,
            Direction::Above => 1,
            Direction::Right => 2,
            Direction::Below => 3,
            Direction::Any => 4,
        }
    }
}

/// A token returned by a neighbourhood query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub token: TokenId,
    pub distance: f32,
    pub direction: Direction,
}

/// Cluster boxes into row bands.
///
/// Two boxes are linked when their vertical overlap exceeds `fraction` of
/// the shorter height; bands are the connected components. Bands come back
/// top to bottom, members left to right.
pub fn row_bands(boxes: &[BBox], fraction: f32) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..boxes.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut by_top: Vec<usize> = (0..boxes.len()).collect();
    by_top.sort_by(|&a, &b| boxes[a].y1.total_cmp(&boxes[b].y1).then(a.cmp(&b)));

    for (pos, &a) in by_top.iter().enumerate() {
        for &b in &by_top[pos + 1..] {
            if boxes[b].y1 >= boxes[a].y2 {
                break;
            }
            if boxes[a].shares_row(&boxes[b], fraction) {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }
    }

    let mut bands: Vec<Vec<usize>> = Vec::new();
    let mut band_of_root = vec![usize::MAX; boxes.len()];
    for i in 0..boxes.len() {
        let root = find(&mut parent, i);
        if band_of_root[root] == usize::MAX {
            band_of_root[root] = bands.len();
            bands.push(Vec::new());
        }
        bands[band_of_root[root]].push(i);
    }

    let center_x = |i: usize| boxes[i].center().0;
    for band in &mut bands {
        band.sort_by(|&a, &b| center_x(a).total_cmp(&center_x(b)).then(a.cmp(&b)));
    }

    let top = |band: &Vec<usize>| band.iter().map(|&i| boxes[i].y1).fold(f32::INFINITY, f32::min);
    let left = |band: &Vec<usize>| band.iter().map(|&i| boxes[i].x1).fold(f32::INFINITY, f32::min);
    bands.sort_by(|a, b| {
        top(a)
            .total_cmp(&top(b))
            .then_with(|| left(a).total_cmp(&left(b)))
            .then_with(|| a[0].cmp(&b[0]))
    });
    bands
}

#[derive(Debug, Clone)]
struct Band {
    top: f32,
    bottom: f32,
    /// Members sorted by x center.
    members: Vec<TokenId>,
    centers: Vec<f32>,
    max_half_width: f32,
}

/// Row-band bucketed index over the tokens of one image.
///
/// Built once per image and never mutated.
#[derive(Debug)]
pub struct SpatialIndex<'a> {
    tokens: &'a [Token],
    bands: Vec<Band>,
    band_of: Vec<usize>,
    position_in_band: Vec<usize>,
    metric: DistanceMetric,
    row_fraction: f32,
}

impl<'a> SpatialIndex<'a> {
    /// Build the index. `tokens[i].id` must be `TokenId(i)`.
    pub fn build(tokens: &'a [Token], row_fraction: f32, metric: DistanceMetric) -> Self {
        let boxes: Vec<BBox> = tokens.iter().map(|t| t.bbox).collect();
        let mut band_of = vec![0; tokens.len()];
        let mut position_in_band = vec![0; tokens.len()];

        let bands = row_bands(&boxes, row_fraction)
            .into_iter()
            .enumerate()
            .map(|(band_idx, members)| {
                for (pos, &i) in members.iter().enumerate() {
                    band_of[i] = band_idx;
                    position_in_band[i] = pos;
                }
                Band {
                    top: members.iter().map(|&i| boxes[i].y1).fold(f32::INFINITY, f32::min),
                    bottom: members.iter().map(|&i| boxes[i].y2).fold(f32::NEG_INFINITY, f32::max),
                    centers: members.iter().map(|&i| boxes[i].center().0).collect(),
                    max_half_width: members.iter().map(|&i| boxes[i].width() / 2.0).fold(0.0, f32::max),
                    members: members.into_iter().map(TokenId).collect(),
                }
            })
            .collect();

        Self {
            tokens,
            bands,
            band_of,
            position_in_band,
            metric,
            row_fraction,
        }
    }

    pub fn tokens(&self) -> &'a [Token] {
        self.tokens
    }

    pub fn token(&self, id: TokenId) -> &'a Token {
        &self.tokens[id.0]
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_of(&self, id: TokenId) -> usize {
        self.band_of[id.0]
    }

    /// Tokens of a band, left to right.
    pub fn band_members(&self, band: usize) -> &[TokenId] {
        self.bands.get(band).map(|b| b.members.as_slice()).unwrap_or(&[])
    }

    pub fn band_height(&self, band: usize) -> f32 {
        self.bands.get(band).map(|b| b.bottom - b.top).unwrap_or(0.0)
    }

    /// Token immediately left of `id` in its band.
    pub fn left_of(&self, id: TokenId) -> Option<TokenId> {
        let pos = self.position_in_band[id.0];
        let band = &self.bands[self.band_of[id.0]];
        pos.checked_sub(1).map(|p| band.members[p])
    }

    /// Token immediately right of `id` in its band.
    pub fn right_of(&self, id: TokenId) -> Option<TokenId> {
        let pos = self.position_in_band[id.0];
        self.bands[self.band_of[id.0]].members.get(pos + 1).copied()
    }

    /// Distance between two boxes under the configured metric.
    pub fn distance(&self, a: &BBox, b: &BBox) -> f32 {
        match self.metric {
            DistanceMetric::Center => a.center_distance(b),
            DistanceMetric::Edge => a.edge_distance(b),
        }
    }

    pub fn direction(&self, target: &BBox, origin: &BBox) -> Direction {
        Direction::of(target, origin, self.row_fraction)
    }

    /// Tokens within `max_distance` of `origin` in `direction` that satisfy
    /// `predicate`, nearest first, ties broken by reading order.
    pub fn nearest<F>(
        &self,
        origin: &BBox,
        max_distance: f32,
        direction: Direction,
        predicate: F,
    ) -> Vec<Neighbor>
    where
        F: Fn(&Token) -> bool,
    {
        let (_, origin_cy) = origin.center();
        let mut hits = Vec::new();

        for band in &self.bands {
            // Cheapest possible vertical distance to anything in this band
            let vertical = match self.metric {
                DistanceMetric::Center => (band.top - origin_cy).max(origin_cy - band.bottom),
                DistanceMetric::Edge => (band.top - origin.y2).max(origin.y1 - band.bottom),
            };
            if vertical > max_distance {
                continue;
            }

            let reach = max_distance + band.max_half_width;
            let start = band.centers.partition_point(|&cx| cx < origin.x1 - reach);
            let end = band.centers.partition_point(|&cx| cx <= origin.x2 + reach);

            for &id in &band.members[start..end] {
                let token = &self.tokens[id.0];
                if !predicate(token) {
                    continue;
                }
                let distance = self.distance(&token.bbox, origin);
                if distance > max_distance {
                    continue;
                }
                let actual = self.direction(&token.bbox, origin);
                if direction.accepts(actual) {
                    hits.push(Neighbor {
                        token: id,
                        distance,
                        direction: actual,
                    });
                }
            }
        }

        hits.sort_by(|a, b| self.neighbor_order(a, b));
        hits
    }

    /// Text tokens near `origin`.
    pub fn nearest_text_tokens(
        &self,
        origin: &BBox,
        max_distance: f32,
        direction: Direction,
    ) -> Vec<Neighbor> {
        self.nearest(origin, max_distance, direction, Token::is_text)
    }

    fn neighbor_order(&self, a: &Neighbor, b: &Neighbor) -> Ordering {
        a.distance.total_cmp(&b.distance).then_with(|| {
            self.tokens[a.token.0]
                .reading_order_index
                .cmp(&self.tokens[b.token.0].reading_order_index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::TokenKind;
    use pretty_assertions::assert_eq;

    fn token(i: usize, text: &str, kind: TokenKind, bbox: BBox) -> Token {
        Token {
            id: TokenId(i),
            text: text.to_string(),
            bbox,
            kind,
            reading_order_index: i,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_row_bands_tolerate_misalignment() {
        let boxes = vec![
            BBox::new(200.0, 12.0, 260.0, 42.0),
            BBox::new(10.0, 10.0, 100.0, 40.0),
            BBox::new(10.0, 100.0, 100.0, 130.0),
            BBox::new(110.0, 5.0, 180.0, 35.0),
        ];

        let bands = row_bands(&boxes, 0.5);
        assert_eq!(bands, vec![vec![1, 3, 0], vec![2]]);
    }

    #[test]
    fn test_row_bands_small_overlap_splits() {
        let boxes = vec![
            BBox::new(0.0, 0.0, 50.0, 30.0),
            BBox::new(60.0, 25.0, 110.0, 55.0),
        ];
        assert_eq!(row_bands(&boxes, 0.5).len(), 2);
    }

    #[test]
    fn test_direction() {
        let origin = BBox::new(100.0, 100.0, 150.0, 130.0);
        assert_eq!(Direction::of(&BBox::new(20.0, 100.0, 80.0, 130.0), &origin, 0.5), Direction::Left);
        assert_eq!(Direction::of(&BBox::new(160.0, 105.0, 200.0, 135.0), &origin, 0.5), Direction::Right);
        assert_eq!(Direction::of(&BBox::new(100.0, 50.0, 150.0, 80.0), &origin, 0.5), Direction::Above);
        assert_eq!(Direction::of(&BBox::new(100.0, 150.0, 150.0, 180.0), &origin, 0.5), Direction::Below);
        assert!(Direction::Left.rank() < Direction::Above.rank());
        assert!(Direction::Right.rank() < Direction::Below.rank());
    }

    #[test]
    fn test_nearest_text_tokens_ordered_by_distance() {
        let tokens = vec![
            token(0, "遠い", TokenKind::Text, BBox::new(0.0, 0.0, 40.0, 30.0)),
            token(1, "近い", TokenKind::Text, BBox::new(60.0, 0.0, 100.0, 30.0)),
            token(2, "198円", TokenKind::Numeric, BBox::new(110.0, 0.0, 170.0, 30.0)),
            token(3, "下", TokenKind::Text, BBox::new(110.0, 40.0, 170.0, 70.0)),
            token(4, "ずっと下", TokenKind::Text, BBox::new(110.0, 400.0, 170.0, 430.0)),
        ];
        let index = SpatialIndex::build(&tokens, 0.5, DistanceMetric::Center);
        let origin = tokens[2].bbox;

        let hits = index.nearest_text_tokens(&origin, 150.0, Direction::Any);
        let ids: Vec<_> = hits.iter().map(|n| n.token.0).collect();
        assert_eq!(ids, vec![3, 1, 0]);
        assert_eq!(hits[0].direction, Direction::Below);
        assert_eq!(hits[1].direction, Direction::Left);

        let left = index.nearest_text_tokens(&origin, 150.0, Direction::Left);
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|n| n.direction == Direction::Left));
    }

    #[test]
    fn test_ties_broken_by_reading_order() {
        let tokens = vec![
            token(0, "左", TokenKind::Text, BBox::new(0.0, 0.0, 40.0, 30.0)),
            token(1, "1,000", TokenKind::Numeric, BBox::new(50.0, 0.0, 90.0, 30.0)),
            token(2, "右", TokenKind::Text, BBox::new(100.0, 0.0, 140.0, 30.0)),
        ];
        let index = SpatialIndex::build(&tokens, 0.5, DistanceMetric::Center);

        let hits = index.nearest_text_tokens(&tokens[1].bbox, 100.0, Direction::Any);
        assert_eq!(hits[0].token, TokenId(0));
        assert_eq!(hits[1].token, TokenId(2));
        assert_eq!(hits[0].distance, hits[1].distance);
    }

    #[test]
    fn test_band_neighbours() {
        let tokens = vec![
            token(0, "a", TokenKind::Text, BBox::new(0.0, 0.0, 40.0, 30.0)),
            token(1, "b", TokenKind::Text, BBox::new(50.0, 0.0, 90.0, 30.0)),
            token(2, "c", TokenKind::Text, BBox::new(0.0, 50.0, 40.0, 80.0)),
        ];
        let index = SpatialIndex::build(&tokens, 0.5, DistanceMetric::Edge);

        assert_eq!(index.band_count(), 2);
        assert_eq!(index.left_of(TokenId(1)), Some(TokenId(0)));
        assert_eq!(index.right_of(TokenId(1)), None);
        assert_eq!(index.left_of(TokenId(2)), None);
        assert_eq!(index.band_height(0), 30.0);
        assert_eq!(index.distance(&tokens[0].bbox, &tokens[1].bbox), 10.0);
    }
}
