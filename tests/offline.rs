//! Exercise the repositories against recorded responses in `example_data`.

use std::cell::RefCell;

use metfor::{Km, Meters};
use tempdir::TempDir;
use watobs::{
    AltimetryData, AltimetryQuery, Coords, DatafarmRepository, DhiAltimetryRepository,
    DmiOceanObsRepository, HttpClient, ObservationQuery, Request, Response, TimeSeriesQuery,
    WatObsErr,
};

const ALTIMETRY_CSV: &str = include_str!("../example_data/altimetry_kattegat.csv");
const DMI_OBSERVATIONS: &str = include_str!("../example_data/dmi_observations_30336.json");
const DMI_STATIONS: &str = include_str!("../example_data/dmi_stations.json");
const DATAFARM_EXTRACT: &str = include_str!("../example_data/datafarm_extract.json");

const DOWNLOAD_URL: &str = "https://download.example.com/extract.csv";

/// Answers requests from the files in `example_data` and remembers what was asked.
#[derive(Default)]
struct Recorded {
    requests: RefCell<Vec<Request>>,
}

impl Recorded {
    fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }
}

impl HttpClient for Recorded {
    fn execute(&self, request: &Request) -> Result<Response, WatObsErr> {
        self.requests.borrow_mut().push(request.clone());

        let url = request.url.as_str();
        let response = if url.ends_with("/query-csv") {
            Response::new(200, format!(r#"{{"download_url": "{}"}}"#, DOWNLOAD_URL))
        } else if url == DOWNLOAD_URL {
            Response::new(200, ALTIMETRY_CSV)
        } else if url.ends_with("/collections/observation/items") {
            Response::new(200, DMI_OBSERVATIONS)
        } else if url.ends_with("/collections/station/items") {
            Response::new(200, DMI_STATIONS)
        } else if url.ends_with("/Login/Login") {
            Response::new(200, "").with_header("Access-Token", "recorded-session")
        } else if url.ends_with("/TimeSeries/ExtractData") {
            Response::new(200, DATAFARM_EXTRACT)
        } else if url.ends_with("/Login/Logoff") {
            Response::new(200, "")
        } else {
            Response::new(404, "not recorded")
        };

        Ok(response)
    }
}

#[test]
fn test_altimetry_download_and_csv() {
    let repo = DhiAltimetryRepository::with_client("key", Recorded::default());
    let query = AltimetryQuery::new("lon=10.9&lat=55.9&radius=10.0")
        .unwrap()
        .between("2020-02-01", "2020-02-05")
        .unwrap();

    let data = repo.get_altimetry_data(&query).unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(data.satellites(), vec!["3a", "j3"]);
    assert_eq!(data.records()[2].water_level, None);

    let levels: Vec<Option<Meters>> = data.water_levels();
    assert_eq!(levels[0], Some(Meters(0.31)));

    let near = data.within_radius(&Coords::from_lon_lat(10.95, 55.91), Km(1.0));
    assert_eq!(near.len(), 1);

    let urls = repo.client().urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].ends_with("/query-csv"));
    assert_eq!(urls[1], DOWNLOAD_URL);

    let tmp = TempDir::new("watobs-test").unwrap();
    let path = tmp.path().join("good.csv");
    data.to_csv(&path, None, Some(0)).unwrap();

    let good = AltimetryData::from_csv(&path).unwrap();
    assert_eq!(good.len(), 3);
    assert!(good.records().iter().all(|rec| rec.quality == Some(0)));
    assert_eq!(good.records()[0], data.records()[0]);

    let none = tmp.path().join("none.csv");
    match data.to_csv(&none, Some("c2"), None) {
        Err(WatObsErr::NoData) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!none.exists());
}

#[test]
fn test_dmi_stations_and_observations() {
    let repo = DmiOceanObsRepository::with_client("key", Recorded::default());

    let stations = repo.get_stations().unwrap();
    let active: Vec<&str> = stations
        .iter()
        .filter(|st| st.is_active() && st.measures("sealev_dvr"))
        .map(|st| st.id.as_str())
        .collect();
    assert_eq!(active, vec!["30336", "22331"]);

    let query = ObservationQuery::new("30336")
        .between("2021-01-01", "2021-01-02")
        .unwrap();
    let table = repo.get_observed_data(&query).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.values(), vec![Some(29.0), Some(31.0), Some(34.0)]);
    assert_eq!(
        table.start_time(),
        watobs::parse_datetime("2021-01-01T00:00:00Z").ok()
    );

    let requests = repo.client().requests.borrow();
    let last = requests.last().unwrap();
    assert_eq!(last.param("stationId"), Some("30336"));
    assert_eq!(last.param("parameterId"), Some("sealev_dvr"));
    assert_eq!(
        last.param("datetime"),
        Some("2021-01-01T00:00:00Z/2021-01-02T00:00:00Z")
    );
}

#[test]
fn test_datafarm_session() {
    let repo = DatafarmRepository::with_client("key", Recorded::default());
    repo.connect().unwrap();
    assert_eq!(repo.access_token().as_deref(), Some("recorded-session"));

    let query = TimeSeriesQuery::new(&["TNWB_wind_RVO-FUGRO_unfiltered_WS-130"])
        .between("2015-03-24", "2015-03-25")
        .unwrap();
    let table = repo.get_data(&query).unwrap();

    assert_eq!(table.shape(), (3, 3));
    assert_eq!(table.index_name(), Some("RefDateTimeRef"));

    let values: Vec<Option<f64>> = table
        .column("Data")
        .unwrap()
        .into_iter()
        .map(|cell| cell.as_f64())
        .collect();
    assert_eq!(values, vec![Some(7.52), Some(7.91), None]);

    repo.close().unwrap();
    assert!(!repo.is_connected());

    let requests = repo.client().requests.borrow();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].header("Access-Token"), Some("recorded-session"));
}
