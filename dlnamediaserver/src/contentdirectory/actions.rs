use dlnaupnp::model::ActionSpec;

fn with_result(action: ActionSpec) -> ActionSpec {
    action
        .output("Result", "A_ARG_TYPE_Result")
        .output("NumberReturned", "A_ARG_TYPE_Count")
        .output("TotalMatches", "A_ARG_TYPE_Count")
        .output("UpdateID", "A_ARG_TYPE_UpdateID")
}

pub(super) fn all() -> Vec<ActionSpec> {
    vec![
        ActionSpec::new("GetSearchCapabilities").output("SearchCaps", "SearchCapabilities"),
        ActionSpec::new("GetSortCapabilities").output("SortCaps", "SortCapabilities"),
        ActionSpec::new("GetSystemUpdateID").output("Id", "SystemUpdateID"),
        with_result(
            ActionSpec::new("Browse")
                .input("ObjectID", "A_ARG_TYPE_ObjectID")
                .input("BrowseFlag", "A_ARG_TYPE_BrowseFlag")
                .input("Filter", "A_ARG_TYPE_Filter")
                .input("StartingIndex", "A_ARG_TYPE_Index")
                .input("RequestedCount", "A_ARG_TYPE_Count")
                .input("SortCriteria", "A_ARG_TYPE_SortCriteria"),
        ),
        with_result(
            ActionSpec::new("Search")
                .input("ContainerID", "A_ARG_TYPE_ObjectID")
                .input("SearchCriteria", "A_ARG_TYPE_SearchCriteria")
                .input("Filter", "A_ARG_TYPE_Filter")
                .input("StartingIndex", "A_ARG_TYPE_Index")
                .input("RequestedCount", "A_ARG_TYPE_Count")
                .input("SortCriteria", "A_ARG_TYPE_SortCriteria"),
        ),
    ]
}
