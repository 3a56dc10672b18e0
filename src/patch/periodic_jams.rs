use super::{InputKind, InputType, Patch, PatchArgs, PatchInput};
use crate::client::ListenBrainzApi;
use crate::error::{PipelineError, Result};
use crate::pipeline::filters::{
    HatedRecordingsFilter, LatestListenedAtFilter, NeverListenedFilter,
};
use crate::pipeline::lookups::{
    ListensFeedbackLookup, MAX_RECS_LIMIT, RecentListensTimestampLookup, RecordingLookupElement,
    UserRecordingRecommendationsElement,
};
use crate::pipeline::{BoxedElement, Element};
use crate::playlist::{Playlist, PlaylistMakerConfig, PlaylistMakerElement};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use log::debug;
use std::rc::Rc;

pub const SLUG: &str = "periodic-jams";

/// Tracks listened to within this many days are left out of every jam
pub const DAYS_OF_RECENT_LISTENS_TO_EXCLUDE: i64 = 60;
/// Window of fresh listens fetched to correct stale recommendation data
const RECENT_LISTENS_DAYS: i64 = 2;
const MAX_NUM_RECORDINGS: usize = 50;
const MAX_ARTIST_OCCURRENCE: usize = 2;
const EXPIRES_AFTER_WEEKS: i64 = 2;

const INPUTS: &[PatchInput] = &[
    PatchInput {
        name: "user_name",
        kind: InputKind::Argument,
        required: true,
        ty: InputType::Text,
        help: "MusicBrainz user name that has an account on ListenBrainz",
    },
    PatchInput {
        name: "type",
        kind: InputKind::Argument,
        required: false,
        ty: InputType::Text,
        help: "one of daily-jams (default), weekly-jams or weekly-exploration",
    },
    PatchInput {
        name: "jam_date",
        kind: InputKind::Argument,
        required: false,
        ty: InputType::Date,
        help: "date the jam is made for, YYYY-MM-DD; defaults to today (UTC)",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JamType {
    DailyJams,
    WeeklyJams,
    WeeklyExploration,
}

impl JamType {
    pub const ALL: [JamType; 3] = [
        JamType::DailyJams,
        JamType::WeeklyJams,
        JamType::WeeklyExploration,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            JamType::DailyJams => "daily-jams",
            JamType::WeeklyJams => "weekly-jams",
            JamType::WeeklyExploration => "weekly-exploration",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let text = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|jam| jam.slug() == text)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(JamType::slug).collect();
                PipelineError::new(format!("Jam type must be one of {}", names.join(", ")))
            })
    }

    fn title(&self) -> &'static str {
        match self {
            JamType::DailyJams => "Daily Jams",
            JamType::WeeklyJams => "Weekly Jams",
            JamType::WeeklyExploration => "Weekly Exploration",
        }
    }

    fn description(&self) -> String {
        format!("{} playlist!", self.title())
    }

    fn is_weekly(&self) -> bool {
        !matches!(self, JamType::DailyJams)
    }
}

/// Daily jams, weekly jams or weekly exploration from the user's recommendations.
///
/// Recommendations are annotated with fresh listen timestamps, then split on
/// listening history: jams keep tracks heard before, exploration keeps the
/// unheard ones. Recently heard and hated tracks are removed before making
/// the playlist.
pub struct PeriodicJamsPatch {
    api: Rc<dyn ListenBrainzApi>,
}

impl PeriodicJamsPatch {
    pub fn new(api: Rc<dyn ListenBrainzApi>) -> Self {
        Self { api }
    }
}

/// The date a jam is made for and how its name shows it. A date the user
/// gave appears as given; the default of today also names the weekday.
fn jam_day(given: Option<NaiveDate>, today: NaiveDate) -> (NaiveDate, String) {
    match given {
        Some(date) => (date, date.format("%Y-%m-%d").to_string()),
        None => (today, today.format("%Y-%m-%d %a").to_string()),
    }
}

pub fn jam_name(jam: JamType, user_name: &str, date: &str) -> String {
    if jam.is_weekly() {
        format!("{} for {user_name}, week of {date}", jam.title())
    } else {
        format!("{} for {user_name}, {date}", jam.title())
    }
}

fn chain(mut stage: BoxedElement, source: BoxedElement) -> Result<BoxedElement> {
    stage.set_sources(vec![source])?;
    Ok(stage)
}

impl Patch for PeriodicJamsPatch {
    fn slug(&self) -> &'static str {
        SLUG
    }

    fn description(&self) -> &'static str {
        "Generate a periodic playlist from the ListenBrainz recommended recordings."
    }

    fn inputs(&self) -> &'static [PatchInput] {
        INPUTS
    }

    fn create(&self, args: &PatchArgs) -> Result<BoxedElement<Vec<Playlist>>> {
        let user_name = args.required_text("user_name")?;
        let jam = match args.text("type") {
            Some(text) => JamType::parse(text)?,
            None => JamType::DailyJams,
        };
        let (jam_date, date_label) = jam_day(args.date("jam_date"), Utc::now().date_naive());
        debug!("creating {} for {user_name} on {jam_date}", jam.slug());

        let recs: BoxedElement = Box::new(UserRecordingRecommendationsElement::new(
            self.api.clone(),
            user_name,
            "raw",
            MAX_RECS_LIMIT,
        ));
        let recent = chain(
            Box::new(RecentListensTimestampLookup::new(
                self.api.clone(),
                user_name,
                RECENT_LISTENS_DAYS,
            )),
            recs,
        )?;
        let history: BoxedElement = match jam {
            JamType::DailyJams | JamType::WeeklyJams => {
                Box::new(NeverListenedFilter::keep_listened())
            }
            JamType::WeeklyExploration => Box::new(NeverListenedFilter::keep_unlistened()),
        };
        let history = chain(history, recent)?;
        let latest = chain(
            Box::new(LatestListenedAtFilter::days(DAYS_OF_RECENT_LISTENS_TO_EXCLUDE)),
            history,
        )?;
        let feedback = chain(
            Box::new(ListensFeedbackLookup::new(self.api.clone(), user_name)),
            latest,
        )?;
        let lookup = chain(Box::new(RecordingLookupElement::new(self.api.clone())), feedback)?;
        let hated = chain(Box::new(HatedRecordingsFilter::hated()), lookup)?;

        let mut maker = PlaylistMakerElement::new(PlaylistMakerConfig {
            name: Some(jam_name(jam, user_name, &date_label)),
            description: Some(jam.description()),
            patch_slug: Some(jam.slug().to_string()),
            max_num_recordings: Some(MAX_NUM_RECORDINGS),
            max_artist_occurrence: Some(MAX_ARTIST_OCCURRENCE),
            shuffle: true,
            expires_at: Some(Utc::now() + Duration::weeks(EXPIRES_AFTER_WEEKS)),
            is_public: true,
            is_april_first: jam_date.month() == 4 && jam_date.day() == 1,
        })?;
        maker.set_sources(vec![hated])?;
        Ok(Box::new(maker))
    }
}
