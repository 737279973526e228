//! Variables d'état du ContentDirectory.

use dlnadidl::property::KNOWN_PROPERTIES;
use dlnaupnp::model::{DataType, StateVariableSpec};

/// Liste annoncée par `GetSearchCapabilities` et `GetSortCapabilities`.
pub fn capabilities() -> String {
    KNOWN_PROPERTIES.join(",")
}

pub(super) fn all() -> Vec<StateVariableSpec> {
    let string = |name: &str| StateVariableSpec::new(name, DataType::String);
    let ui4 = |name: &str| StateVariableSpec::new(name, DataType::Ui4);

    vec![
        string("SearchCapabilities").default_value(capabilities()),
        string("SortCapabilities").default_value(capabilities()),
        ui4("SystemUpdateID").evented(),
        string("ContainerUpdateIDs").evented(),
        string("A_ARG_TYPE_ObjectID"),
        string("A_ARG_TYPE_Result"),
        string("A_ARG_TYPE_SearchCriteria"),
        string("A_ARG_TYPE_BrowseFlag").allowed(&["BrowseMetadata", "BrowseDirectChildren"]),
        string("A_ARG_TYPE_Filter"),
        string("A_ARG_TYPE_SortCriteria"),
        ui4("A_ARG_TYPE_Index"),
        ui4("A_ARG_TYPE_Count"),
        ui4("A_ARG_TYPE_UpdateID"),
    ]
}
