//! Static schema metadata: tables, columns, relationships and the object
//! entities mapped onto them.
mod data_map;
mod entity;
mod obj;

pub use data_map::*;
pub use entity::*;
pub use obj::*;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::types::{JdbcType, ValueKind};

    /// ARTIST 1..n PAINTING n..1 GALLERY, plus a second PAINTING -> ARTIST
    /// relationship through ORIGINAL_ARTIST_ID.
    pub fn artist_map() -> DataMap {
        DataMap::new("testmap")
            .with_db_entity(
                DbEntity::new("ARTIST")
                    .with_attribute(DbAttribute::new("ARTIST_ID", JdbcType::BigInt).primary_key())
                    .with_attribute(
                        DbAttribute::new("ARTIST_NAME", JdbcType::Char)
                            .with_length(254)
                            .mandatory(),
                    )
                    .with_attribute(DbAttribute::new("DATE_OF_BIRTH", JdbcType::Date))
                    .with_relationship(DbRelationship::to_many(
                        "paintingArray",
                        "PAINTING",
                        "ARTIST_ID",
                        "ARTIST_ID",
                    )),
            )
            .with_db_entity(
                DbEntity::new("PAINTING")
                    .with_attribute(DbAttribute::new("PAINTING_ID", JdbcType::Integer).primary_key())
                    .with_attribute(DbAttribute::new("ARTIST_ID", JdbcType::BigInt))
                    .with_attribute(DbAttribute::new("ORIGINAL_ARTIST_ID", JdbcType::BigInt))
                    .with_attribute(DbAttribute::new("GALLERY_ID", JdbcType::Integer))
                    .with_attribute(
                        DbAttribute::new("PAINTING_TITLE", JdbcType::VarChar)
                            .with_length(255)
                            .mandatory(),
                    )
                    .with_attribute(DbAttribute::new("ESTIMATED_PRICE", JdbcType::Decimal))
                    .with_relationship(DbRelationship::to_one(
                        "toArtist",
                        "ARTIST",
                        "ARTIST_ID",
                        "ARTIST_ID",
                    ))
                    .with_relationship(DbRelationship::to_one(
                        "toOriginalArtist",
                        "ARTIST",
                        "ORIGINAL_ARTIST_ID",
                        "ARTIST_ID",
                    ))
                    .with_relationship(DbRelationship::to_one(
                        "toGallery",
                        "GALLERY",
                        "GALLERY_ID",
                        "GALLERY_ID",
                    )),
            )
            .with_db_entity(
                DbEntity::new("GALLERY")
                    .with_attribute(DbAttribute::new("GALLERY_ID", JdbcType::Integer).primary_key())
                    .with_attribute(DbAttribute::new("GALLERY_NAME", JdbcType::VarChar).with_length(100))
                    .with_relationship(DbRelationship::to_many(
                        "paintingArray",
                        "PAINTING",
                        "GALLERY_ID",
                        "GALLERY_ID",
                    )),
            )
            .with_obj_entity(
                ObjEntity::new("Artist", "ARTIST")
                    .with_attribute(ObjAttribute::new("artistName", ValueKind::String, "ARTIST_NAME"))
                    .with_attribute(ObjAttribute::new("dateOfBirth", ValueKind::Date, "DATE_OF_BIRTH"))
                    .with_relationship(ObjRelationship::new("paintingArray", "Painting", "paintingArray")),
            )
            .with_obj_entity(
                ObjEntity::new("Painting", "PAINTING")
                    .with_attribute(ObjAttribute::new("paintingTitle", ValueKind::String, "PAINTING_TITLE"))
                    .with_attribute(ObjAttribute::new("estimatedPrice", ValueKind::Decimal, "ESTIMATED_PRICE"))
                    .with_attribute(ObjAttribute::new(
                        "galleryName",
                        ValueKind::String,
                        "toGallery.GALLERY_NAME",
                    ))
                    .with_relationship(ObjRelationship::new("toArtist", "Artist", "toArtist"))
                    .with_relationship(ObjRelationship::new(
                        "toOriginalArtist",
                        "Artist",
                        "toOriginalArtist",
                    ))
                    .with_relationship(ObjRelationship::new("toGallery", "Gallery", "toGallery")),
            )
            .with_obj_entity(
                ObjEntity::new("Gallery", "GALLERY")
                    .with_attribute(ObjAttribute::new("galleryName", ValueKind::String, "GALLERY_NAME"))
                    .with_relationship(ObjRelationship::new("paintingArray", "Painting", "paintingArray")),
            )
    }
}
