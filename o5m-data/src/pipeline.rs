//! Single-pass dispatch of decoded elements to the row writer.

use geo::{Coord, Rect};
use log::{debug, info};
use o5m_core::{DecodeError, Element, ElementSource, FixedCoordinate, SectionOrder};

use crate::error::ConvertError;
use crate::store::SchemaWriter;

const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Counts gathered while loading an element stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvertSummary {
    /// Nodes stored.
    pub nodes: u64,
    /// Ways whose rows were stored.
    pub ways: u64,
    /// Relations whose rows were stored.
    pub relations: u64,
    /// Elements of unknown kind that were skipped.
    pub skipped: u64,
    /// Rows written to `node_tags`.
    pub node_tags: u64,
    /// Rows written to `way_tags`.
    pub way_tags: u64,
    /// Rows written to `way_nodes`.
    pub way_nodes: u64,
    /// Rows written to `relation_tags`.
    pub relation_tags: u64,
    /// Rows written to `relation_members`.
    pub relation_members: u64,
    /// Extent of all positioned nodes, with `x = longitude` and
    /// `y = latitude`.
    pub bounds: Option<Rect<f64>>,
}

impl ConvertSummary {
    /// Elements seen, including skipped ones.
    #[must_use]
    pub const fn elements(&self) -> u64 {
        self.nodes + self.ways + self.relations + self.skipped
    }

    fn include_position(&mut self, lat: f64, lon: f64) {
        let point = Coord { x: lon, y: lat };
        self.bounds = Some(match self.bounds {
            Some(existing) => Rect::new(
                Coord {
                    x: existing.min().x.min(lon),
                    y: existing.min().y.min(lat),
                },
                Coord {
                    x: existing.max().x.max(lon),
                    y: existing.max().y.max(lat),
                },
            ),
            None => Rect::new(point, point),
        });
    }
}

fn decode_failure(processed: u64) -> impl Fn(DecodeError) -> ConvertError + Copy {
    move |source| ConvertError::Decode { processed, source }
}

struct Pipeline<'w, 'tx, S> {
    source: S,
    writer: &'w mut SchemaWriter<'tx>,
    summary: ConvertSummary,
}

impl<S: ElementSource> Pipeline<'_, '_, S> {
    fn drive(&mut self) -> Result<(), ConvertError> {
        loop {
            let failed = decode_failure(self.summary.elements());
            let Some(element) = self.source.next_element().map_err(failed)? else {
                return Ok(());
            };
            match element {
                Element::Node { id, coordinate } => self.load_node(id, coordinate)?,
                Element::Way { id } => self.load_way(id)?,
                Element::Relation { id } => self.load_relation(id)?,
                Element::Unknown { kind } => {
                    debug!("skipping element of unknown kind {kind:#04x}");
                    self.summary.skipped += 1;
                }
            }
            let processed = self.summary.elements();
            if processed % PROGRESS_INTERVAL == 0 {
                info!("processed {processed} elements");
            }
        }
    }

    fn load_node(
        &mut self,
        id: i64,
        coordinate: Option<FixedCoordinate>,
    ) -> Result<(), ConvertError> {
        let position = coordinate.map(|fixed| (fixed.lat_degrees(), fixed.lon_degrees()));
        self.writer.insert_node(id, position)?;
        if let Some((lat, lon)) = position {
            self.summary.include_position(lat, lon);
        }
        let failed = decode_failure(self.summary.elements());
        while let Some(tag) = self.source.next_tag().map_err(failed)? {
            self.writer.insert_node_tag(id, tag.key, tag.value)?;
            self.summary.node_tags += 1;
        }
        self.summary.nodes += 1;
        Ok(())
    }

    fn load_way(&mut self, id: i64) -> Result<(), ConvertError> {
        match self.source.section_order() {
            SectionOrder::MembersFirst => {
                self.load_way_nodes(id)?;
                self.load_way_tags(id)?;
            }
            SectionOrder::TagsFirst => {
                self.load_way_tags(id)?;
                self.load_way_nodes(id)?;
            }
        }
        self.summary.ways += 1;
        Ok(())
    }

    fn load_way_nodes(&mut self, id: i64) -> Result<(), ConvertError> {
        let failed = decode_failure(self.summary.elements());
        let mut local_order = 0;
        while let Some(node_id) = self.source.next_way_node().map_err(failed)? {
            local_order += 1;
            self.writer.insert_way_node(id, local_order, node_id)?;
            self.summary.way_nodes += 1;
        }
        Ok(())
    }

    fn load_way_tags(&mut self, id: i64) -> Result<(), ConvertError> {
        let failed = decode_failure(self.summary.elements());
        while let Some(tag) = self.source.next_tag().map_err(failed)? {
            self.writer.insert_way_tag(id, tag.key, tag.value)?;
            self.summary.way_tags += 1;
        }
        Ok(())
    }

    fn load_relation(&mut self, id: i64) -> Result<(), ConvertError> {
        match self.source.section_order() {
            SectionOrder::MembersFirst => {
                self.load_relation_members(id)?;
                self.load_relation_tags(id)?;
            }
            SectionOrder::TagsFirst => {
                self.load_relation_tags(id)?;
                self.load_relation_members(id)?;
            }
        }
        self.summary.relations += 1;
        Ok(())
    }

    fn load_relation_members(&mut self, id: i64) -> Result<(), ConvertError> {
        let failed = decode_failure(self.summary.elements());
        let mut local_order = 0;
        while let Some(member) = self.source.next_member().map_err(failed)? {
            local_order += 1;
            self.writer
                .insert_relation_member(id, member.kind, member.id, member.role, local_order)?;
            self.summary.relation_members += 1;
        }
        Ok(())
    }

    fn load_relation_tags(&mut self, id: i64) -> Result<(), ConvertError> {
        let failed = decode_failure(self.summary.elements());
        while let Some(tag) = self.source.next_tag().map_err(failed)? {
            self.writer.insert_relation_tag(id, tag.key, tag.value)?;
            self.summary.relation_tags += 1;
        }
        Ok(())
    }
}

/// Drain `source` into `writer`, one element at a time.
///
/// Every row of an element is written before the next element is requested.
/// Ways and relations have their sub-sequences read in the order the source
/// declares, and their node references and members are numbered from 1 in
/// encounter order. Elements of unknown kind are counted and skipped.
///
/// The first decode or store failure stops the run; the caller owns the
/// transaction and decides whether to roll back.
///
/// # Examples
/// ```
/// use o5m_core::test_support::{MemoryElement, MemoryElementSource};
/// use o5m_data::{SchemaWriter, create_tables, run};
/// use rusqlite::Connection;
///
/// let mut connection = Connection::open_in_memory()?;
/// let transaction = connection.transaction()?;
/// create_tables(&transaction)?;
/// let summary = {
///     let mut writer = SchemaWriter::new(&transaction)?;
///     let source = MemoryElementSource::new([
///         MemoryElement::node(1, 481_000_000, 115_000_000),
///         MemoryElement::way(2, [1]).with_tag("highway", "path"),
///     ]);
///     run(source, &mut writer)?
/// };
/// transaction.commit()?;
/// assert_eq!((summary.nodes, summary.ways, summary.way_nodes), (1, 1, 1));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn run<S: ElementSource>(
    source: S,
    writer: &mut SchemaWriter<'_>,
) -> Result<ConvertSummary, ConvertError> {
    let mut pipeline = Pipeline {
        source,
        writer,
        summary: ConvertSummary::default(),
    };
    pipeline.drive()?;
    let summary = pipeline.summary;
    info!(
        "loaded {} nodes, {} ways and {} relations ({} skipped)",
        summary.nodes, summary.ways, summary.relations, summary.skipped
    );
    Ok(summary)
}
