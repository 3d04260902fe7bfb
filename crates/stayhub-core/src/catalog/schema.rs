//! The listing directory schema.

use super::{DeleteBehavior, EntityDef, FieldDef, OwnerField, Registry, RelationDef};

/// Property entity name.
pub const PROPERTY: &str = "Property";
/// Amenity entity name.
pub const AMENITY: &str = "Amenity";
/// MasterAmenity entity name.
pub const MASTER_AMENITY: &str = "MasterAmenity";
/// MasterAmenityUsageType entity name.
pub const MASTER_AMENITY_USAGE_TYPE: &str = "MasterAmenityUsageType";
/// MasterStayPlan entity name.
pub const MASTER_STAY_PLAN: &str = "MasterStayPlan";
/// Image entity name.
pub const IMAGE: &str = "Image";
/// NearBy entity name.
pub const NEAR_BY: &str = "NearBy";
/// User entity name.
pub const USER: &str = "User";
/// Rating entity name.
pub const RATING: &str = "Rating";
/// RatingConversation entity name.
pub const RATING_CONVERSATION: &str = "RatingConversation";
/// StayPlan entity name.
pub const STAY_PLAN: &str = "StayPlan";

fn address_fields() -> Vec<FieldDef> {
    ["line1", "line2", "city", "state", "zip", "landMark"]
        .into_iter()
        .map(FieldDef::string)
        .collect()
}

fn language_fields() -> Vec<FieldDef> {
    ["lang1", "lang2", "lang3", "lang4"]
        .into_iter()
        .map(FieldDef::string)
        .collect()
}

fn property() -> EntityDef {
    EntityDef::new(PROPERTY)
        .with_fields([
            FieldDef::string("type"),
            FieldDef::string("title"),
            FieldDef::string("description"),
            FieldDef::string("status"),
            FieldDef::int("floors"),
            FieldDef::string("AddedDate"),
            FieldDef::string("Effective"),
            FieldDef::string("coverImgage"),
            FieldDef::int("yearBuilt"),
            FieldDef::bool("renovated"),
            FieldDef::int("yearRenovated"),
            FieldDef::reference("userId", USER).owner(),
            FieldDef::int("priceStart"),
            FieldDef::int("priceEnd"),
        ])
        .with_fields(address_fields())
        .with_fields([
            FieldDef::string("geoCode"),
            FieldDef::float("lat"),
            FieldDef::float("lng"),
            FieldDef::string("firstName"),
            FieldDef::string("lastName"),
            FieldDef::string("mobile"),
            FieldDef::string("email"),
        ])
        .with_fields(language_fields())
        .with_fields([
            FieldDef::float("ratingStar").derived(),
            FieldDef::int("ratingCount").derived(),
            FieldDef::string("imgURL"),
            FieldDef::bool("isGym"),
            FieldDef::bool("isCarParking"),
            FieldDef::bool("isBikeParking"),
            FieldDef::bool("isDaily"),
            FieldDef::bool("isWeekly"),
            FieldDef::bool("isMonthly"),
            FieldDef::int("dailyMinPrice"),
            FieldDef::int("dailyMaxPrice"),
            FieldDef::int("weeklyMinPrice"),
            FieldDef::int("weeklyMaxPrice"),
            FieldDef::int("monthlyMinPrice"),
            FieldDef::int("monthlyMaxPrice"),
            FieldDef::bool("verified"),
            FieldDef::string("mostCriticalRating"),
            FieldDef::string("mostHelpfulRating"),
        ])
}

fn amenity() -> EntityDef {
    EntityDef::new(AMENITY).with_fields([
        FieldDef::reference("propId", PROPERTY).required(),
        FieldDef::string("name"),
        FieldDef::string("usageType"),
        FieldDef::int("amount"),
        FieldDef::string("span"),
        FieldDef::string("owner").owner().immutable(),
    ])
}

fn master(name: &str, display_value: bool) -> EntityDef {
    let mut entity = EntityDef::new(name)
        .with_field(FieldDef::string("name"))
        .with_field(FieldDef::string("iconName"))
        .with_owner(OwnerField::Platform);
    if display_value {
        entity = entity.with_field(FieldDef::string("displayValue"));
    }
    entity
}

fn image() -> EntityDef {
    EntityDef::new(IMAGE).with_fields([
        FieldDef::reference("propId", PROPERTY).required(),
        FieldDef::string("fileName"),
        FieldDef::string("descr"),
        FieldDef::int("displayOrder"),
        FieldDef::string("imageURL"),
        FieldDef::int("width"),
        FieldDef::int("height"),
    ])
}

fn near_by() -> EntityDef {
    EntityDef::new(NEAR_BY)
        .with_fields([
            FieldDef::reference("propId", PROPERTY).required(),
            FieldDef::string("type"),
            FieldDef::string("name"),
            FieldDef::int("displayOrder"),
            FieldDef::int("lat"),
            FieldDef::int("lng"),
            FieldDef::int("distance"),
        ])
        .with_fields(address_fields())
}

fn user() -> EntityDef {
    EntityDef::new(USER)
        .with_fields([
            FieldDef::reference("propId", PROPERTY),
            FieldDef::string("displayName"),
            FieldDef::string("firstName"),
            FieldDef::string("lastName"),
            FieldDef::string("email"),
            FieldDef::string("signInMethod"),
            FieldDef::string("mobile"),
        ])
        .with_fields(language_fields())
        .with_owner(OwnerField::Identity)
}

fn rating() -> EntityDef {
    EntityDef::new(RATING).with_fields([
        FieldDef::reference("propId", PROPERTY).required().immutable(),
        FieldDef::reference("userId", USER).required().immutable().owner(),
        FieldDef::string("stayedFrom"),
        FieldDef::string("stayedTo"),
        FieldDef::bool("stayCurrent"),
        FieldDef::int("rating").with_range(1, 5).required(),
        FieldDef::int("cleanRating").with_range(1, 5),
        FieldDef::int("foodRating").with_range(1, 5),
        FieldDef::int("valueRating").with_range(1, 5),
        FieldDef::int("amensRating").with_range(1, 5),
        FieldDef::string("title"),
        FieldDef::string("comment"),
        FieldDef::string("status"),
        FieldDef::string("createdDate"),
    ])
}

fn rating_conversation() -> EntityDef {
    EntityDef::new(RATING_CONVERSATION).with_fields([
        FieldDef::reference("ratingId", RATING).required().immutable(),
        FieldDef::reference("userId", USER).required().owner(),
        FieldDef::string("comment"),
        FieldDef::string("status"),
        FieldDef::string("createdDate"),
    ])
}

fn stay_plan() -> EntityDef {
    EntityDef::new(STAY_PLAN).with_fields([
        FieldDef::reference("propId", PROPERTY).required(),
        FieldDef::string("name"),
        FieldDef::int("minPrice"),
        FieldDef::int("maxPrice"),
        FieldDef::string("foodIncluded"),
    ])
}

impl Registry {
    /// Build the registry for the listing directory.
    pub fn listing() -> Self {
        use DeleteBehavior::{Cascade, Restrict, SetNull};

        Registry::new()
            .with_entity(property())
            .with_entity(amenity())
            .with_entity(master(MASTER_AMENITY, true))
            .with_entity(master(MASTER_AMENITY_USAGE_TYPE, false))
            .with_entity(master(MASTER_STAY_PLAN, true))
            .with_entity(image())
            .with_entity(near_by())
            .with_entity(user())
            .with_entity(rating())
            .with_entity(rating_conversation())
            .with_entity(stay_plan())
            .with_relation(
                RelationDef::new("amenity_property", AMENITY, "propId", PROPERTY)
                    .with_on_delete(Cascade),
            )
            .with_relation(
                RelationDef::new("image_property", IMAGE, "propId", PROPERTY)
                    .with_on_delete(Cascade),
            )
            .with_relation(
                RelationDef::new("nearby_property", NEAR_BY, "propId", PROPERTY)
                    .with_on_delete(Cascade),
            )
            .with_relation(
                RelationDef::new("stayplan_property", STAY_PLAN, "propId", PROPERTY)
                    .with_on_delete(Cascade),
            )
            .with_relation(
                RelationDef::new("rating_property", RATING, "propId", PROPERTY)
                    .with_on_delete(Restrict),
            )
            .with_relation(
                RelationDef::new("conversation_rating", RATING_CONVERSATION, "ratingId", RATING)
                    .with_on_delete(Cascade),
            )
            .with_relation(
                RelationDef::new("user_property", USER, "propId", PROPERTY)
                    .with_on_delete(SetNull),
            )
            .with_relation(RelationDef::new("property_owner", PROPERTY, "userId", USER))
            .with_relation(RelationDef::new("rating_author", RATING, "userId", USER))
            .with_relation(RelationDef::new(
                "conversation_author",
                RATING_CONVERSATION,
                "userId",
                USER,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_entities() {
        let registry = Registry::listing();
        assert_eq!(registry.entity_names().len(), 11);
        assert!(!registry.contains("Todo"));
    }

    #[test]
    fn test_every_foreign_key_has_a_relation() {
        let registry = Registry::listing();
        for name in registry.entity_names() {
            let def = registry.describe(name).unwrap();
            for fk in def.foreign_keys() {
                let relation = registry
                    .relations_from(name)
                    .into_iter()
                    .find(|r| r.from_field == fk.name)
                    .unwrap_or_else(|| panic!("no relation for {}.{}", name, fk.name));
                assert_eq!(Some(&relation.to_entity), fk.references.as_ref());
            }
        }
    }

    #[test]
    fn test_owner_fields() {
        let registry = Registry::listing();
        assert_eq!(registry.describe(PROPERTY).unwrap().owner_field_name(), Some("userId"));
        assert_eq!(registry.describe(RATING).unwrap().owner_field_name(), Some("userId"));
        assert_eq!(registry.describe(USER).unwrap().owner_field_name(), Some("id"));
        assert_eq!(registry.describe(AMENITY).unwrap().owner_field_name(), Some("owner"));
        assert_eq!(
            registry.describe(MASTER_STAY_PLAN).unwrap().owner,
            OwnerField::Platform
        );
    }

    #[test]
    fn test_property_children() {
        let registry = Registry::listing();
        let dependents: Vec<&str> = registry
            .relations_to(PROPERTY)
            .iter()
            .map(|r| r.from_entity.as_str())
            .collect();
        for child in [AMENITY, IMAGE, NEAR_BY, STAY_PLAN, RATING, USER] {
            assert!(dependents.contains(&child), "missing {}", child);
        }
    }
}
